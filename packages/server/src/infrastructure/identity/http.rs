//! Identity provider backed by the platform's account service.
//!
//! Login is a two-step exchange: credentials buy a refresh token, the
//! refresh token buys an access token. Access tokens are HS256 JWTs verified
//! locally against a shared secret, so `validate_token` never leaves the
//! process.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Value, json};

use crate::domain::{AuthTokens, Claims, IdentityError, IdentityProvider, Profile};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    audience: String,
    verify_secret: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, audience: &str, verify_secret: &str) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Api(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            audience: audience.to_string(),
            verify_secret: verify_secret.to_string(),
        })
    }

    fn request_error(e: reqwest::Error) -> IdentityError {
        if e.is_timeout() || e.is_connect() {
            IdentityError::Unavailable(e.to_string())
        } else {
            IdentityError::Api(e.to_string())
        }
    }

    /// POST a body and parse whatever comes back. A body that is not JSON is
    /// treated as an empty answer and left to the field lookups upstream.
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, IdentityError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(Self::request_error)?;
        match response.json::<Value>().await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!("Unparsable identity response from '{}': {}", path, e);
                Ok(Value::Null)
            }
        }
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> IdentityError {
    match e.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            IdentityError::MalformedToken(e.to_string())
        }
        _ => IdentityError::InvalidToken(e.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let body = json!({
            "username": username,
            "password": password,
            "type": "credentials",
            "clientType": "game",
        });
        let login_response = self.post_json("/auth/login", body).await?;
        let refresh_token = login_response
            .pointer("/refreshToken/value")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(IdentityError::Unauthorized)?
            .to_string();

        let token_response = self
            .post_json("/auth/access-token", json!({ "refreshToken": refresh_token }))
            .await?;
        let access_token = token_response
            .pointer("/accessToken/value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // the account id rides inside the freshly issued token
        let claims = self.validate_token(&access_token)?;
        Ok(AuthTokens {
            refresh_token,
            access_token,
            user_id: claims.sub,
        })
    }

    fn validate_token(&self, token: &str) -> Result<Claims, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.verify_secret.as_bytes()),
            &validation,
        )
        .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    async fn fetch_profile(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Profile, IdentityError> {
        let response = self
            .client
            .get(format!("{}/accounts/{}", self.base_url, user_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            let message = body
                .get("errorMessage")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("account request failed with status {}", status));
            return Err(IdentityError::Api(message));
        }
        response
            .json::<Profile>()
            .await
            .map_err(|e| IdentityError::Api(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use jsonwebtoken::{EncodingKey, Header, encode};

    use pavilion_shared::time::unix_now;

    use super::*;

    const SECRET: &str = "test-secret";
    const AUDIENCE: &str = "pavilion";

    fn mint_token(secret: &str, audience: &str, exp: i64, sub: Option<&str>) -> String {
        let claims = Claims {
            sub: sub.map(str::to_string),
            aud: Some(audience.to_string()),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn provider(base_url: &str) -> HttpIdentityProvider {
        HttpIdentityProvider::new(base_url, AUDIENCE, SECRET).unwrap()
    }

    /// Account service stub: alice/wonder logs in, acc-1 has a profile.
    async fn spawn_identity_stub(access_token: String) -> String {
        let app = Router::new()
            .route(
                "/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["username"] == "alice" && body["password"] == "wonder" {
                        Json(json!({ "refreshToken": { "value": "refresh-1" } }))
                    } else {
                        Json(json!({}))
                    }
                }),
            )
            .route(
                "/auth/access-token",
                post(move |Json(body): Json<Value>| async move {
                    assert_eq!(body["refreshToken"], "refresh-1");
                    Json(json!({ "accessToken": { "value": access_token } }))
                }),
            )
            .route(
                "/accounts/{user_id}",
                get(|Path(user_id): Path<String>| async move {
                    if user_id == "acc-1" {
                        (StatusCode::OK, Json(json!({ "nickname": "Alice" })))
                    } else {
                        (
                            StatusCode::NOT_FOUND,
                            Json(json!({ "errorMessage": "account not found" })),
                        )
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_validate_token_accepts_a_fresh_token() {
        // given:
        let provider = provider("http://unused");
        let token = mint_token(SECRET, AUDIENCE, unix_now() + 3600, Some("acc-1"));

        // when:
        let claims = provider.validate_token(&token).unwrap();

        // then:
        assert_eq!(claims.sub.as_deref(), Some("acc-1"));
        assert_eq!(claims.aud.as_deref(), Some(AUDIENCE));
    }

    #[test]
    fn test_validate_token_rejects_an_expired_token() {
        let provider = provider("http://unused");
        let token = mint_token(SECRET, AUDIENCE, unix_now() - 3600, Some("acc-1"));

        assert!(matches!(
            provider.validate_token(&token),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_token_rejects_a_foreign_audience() {
        let provider = provider("http://unused");
        let token = mint_token(SECRET, "someone-else", unix_now() + 3600, Some("acc-1"));

        assert!(matches!(
            provider.validate_token(&token),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_token_rejects_a_forged_signature() {
        let provider = provider("http://unused");
        let token = mint_token("other-secret", AUDIENCE, unix_now() + 3600, Some("acc-1"));

        assert!(matches!(
            provider.validate_token(&token),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_token_flags_garbage_as_malformed() {
        let provider = provider("http://unused");

        assert!(matches!(
            provider.validate_token("not-a-token"),
            Err(IdentityError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn test_login_resolves_tokens_and_account_id() {
        // given: a stub that issues a real signed access token
        let access_token = mint_token(SECRET, AUDIENCE, unix_now() + 3600, Some("acc-1"));
        let base_url = spawn_identity_stub(access_token.clone()).await;
        let provider = provider(&base_url);

        // when:
        let tokens = provider.login("alice", "wonder").await.unwrap();

        // then:
        assert_eq!(tokens.refresh_token, "refresh-1");
        assert_eq!(tokens.access_token, access_token);
        assert_eq!(tokens.user_id.as_deref(), Some("acc-1"));
    }

    #[tokio::test]
    async fn test_login_with_rejected_credentials_is_unauthorized() {
        // given:
        let access_token = mint_token(SECRET, AUDIENCE, unix_now() + 3600, Some("acc-1"));
        let base_url = spawn_identity_stub(access_token).await;
        let provider = provider(&base_url);

        // when / then:
        assert!(matches!(
            provider.login("alice", "nope").await,
            Err(IdentityError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_fetch_profile_returns_the_nickname() {
        // given:
        let access_token = mint_token(SECRET, AUDIENCE, unix_now() + 3600, Some("acc-1"));
        let base_url = spawn_identity_stub(access_token.clone()).await;
        let provider = provider(&base_url);

        // when:
        let profile = provider.fetch_profile("acc-1", &access_token).await.unwrap();

        // then:
        assert_eq!(profile.nickname.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_fetch_profile_surfaces_the_api_error() {
        // given:
        let access_token = mint_token(SECRET, AUDIENCE, unix_now() + 3600, Some("acc-1"));
        let base_url = spawn_identity_stub(access_token.clone()).await;
        let provider = provider(&base_url);

        // when:
        let result = provider.fetch_profile("ghost", &access_token).await;

        // then:
        match result {
            Err(IdentityError::Api(message)) => assert_eq!(message, "account not found"),
            other => panic!("expected an api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        // given: nothing listens on the discard port
        let provider = provider("http://127.0.0.1:9");

        // when / then:
        assert!(matches!(
            provider.login("alice", "wonder").await,
            Err(IdentityError::Unavailable(_))
        ));
    }
}
