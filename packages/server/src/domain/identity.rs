//! Identity provider interface for platform login and token validation.
//!
//! The session layer depends on this trait only; the HTTP-backed
//! implementation lives in the infrastructure layer and tests substitute a
//! mock.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credentials were rejected.
    #[error("unauthorized")]
    Unauthorized,
    /// The provider could not be reached before the request timeout.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    /// The access token is expired or failed signature/claim checks.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The access token could not be parsed at all.
    #[error("malformed token: {0}")]
    MalformedToken(String),
    /// The provider answered with an error response.
    #[error("identity api error: {0}")]
    Api(String),
}

/// Tokens and identity resolved by a credentials login.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub refresh_token: String,
    pub access_token: String,
    /// Account id carried by the access token, when present.
    pub user_id: Option<String>,
}

/// Claims carried by a verified access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the platform account id.
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub exp: i64,
}

/// Public profile of a platform account.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Gateway to the platform identity API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for tokens and the account id.
    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, IdentityError>;

    /// Verify an access token locally and return its claims.
    fn validate_token(&self, token: &str) -> Result<Claims, IdentityError>;

    /// Fetch the public profile of an account.
    async fn fetch_profile(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Profile, IdentityError>;
}
