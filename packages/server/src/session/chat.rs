//! Chat protocol: authenticate, then exchange room-wide messages.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use pavilion_shared::time::Clock;

use crate::chat_log::ChatLog;
use crate::domain::{AuthState, ConnectionId, IdentityError, IdentityProvider, build_broadcast};
use crate::hub::{BroadcastHub, CHAT_GROUP, OutboundSender};
use crate::online::OnlineRegistry;
use crate::session::{SessionHandler, send_reply};

/// Messages returned by a `history` request without an explicit limit.
const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// One chat connection, from the unauthenticated handshake to the room.
///
/// The session joins the chat group only after a successful login; until
/// then every frame except `login` is answered with an error and nothing
/// reaches the room.
pub struct ChatSession {
    conn: ConnectionId,
    state: AuthState,
    hub: Arc<BroadcastHub>,
    chat_log: Arc<ChatLog>,
    identity: Arc<dyn IdentityProvider>,
    online: Arc<OnlineRegistry>,
    clock: Arc<dyn Clock>,
    sender: OutboundSender,
}

impl ChatSession {
    pub fn new(
        conn: ConnectionId,
        hub: Arc<BroadcastHub>,
        chat_log: Arc<ChatLog>,
        identity: Arc<dyn IdentityProvider>,
        online: Arc<OnlineRegistry>,
        clock: Arc<dyn Clock>,
        sender: OutboundSender,
    ) -> Self {
        Self {
            conn,
            state: AuthState::Unauthenticated,
            hub,
            chat_log,
            identity,
            online,
            clock,
            sender,
        }
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.state
    }

    fn reply(&self, payload: Value) {
        send_reply(&self.sender, &self.conn, payload);
    }

    fn reply_error(&self, message: &str) {
        self.reply(json!({ "error": message }));
    }

    async fn handle_login(&mut self, content: &Map<String, Value>) {
        let username = content.get("username").and_then(Value::as_str).unwrap_or_default();
        let password = content.get("password").and_then(Value::as_str).unwrap_or_default();
        let token = content
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());

        let resolved = if let Some(token) = token {
            self.authenticate_with_token(token).await
        } else if !username.is_empty() && !password.is_empty() {
            self.authenticate_with_credentials(username, password).await
        } else {
            self.reply_error("provide either username and password or a token");
            return;
        };

        let Some((user_id, nickname)) = resolved else {
            return;
        };

        self.hub.join(CHAT_GROUP, self.conn.clone(), self.sender.clone()).await;
        self.online.insert(user_id.clone()).await;
        tracing::info!("user:{}|action:connected", user_id);
        self.state = AuthState::Authenticated { user_id, nickname };
        self.reply(json!({ "info": "connected" }));
    }

    /// Resolve credentials to an account id and nickname, replying with the
    /// specific failure when they don't.
    async fn authenticate_with_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Option<(String, Option<String>)> {
        let tokens = match self.identity.login(username, password).await {
            Ok(tokens) => tokens,
            Err(IdentityError::Unauthorized) => {
                self.reply_error("invalid credentials");
                return None;
            }
            Err(IdentityError::Unavailable(e)) => {
                tracing::warn!("Identity provider unavailable: {}", e);
                self.reply_error("authentication server is unavailable");
                return None;
            }
            Err(e) => {
                tracing::error!("Login failed for '{}': {}", username, e);
                self.reply_error("error occurred during login");
                return None;
            }
        };

        let Some(user_id) = tokens.user_id else {
            self.reply_error(&format!("could not find user with username {}", username));
            return None;
        };

        let nickname = self.lookup_nickname(&user_id, &tokens.access_token).await;
        Some((user_id, nickname))
    }

    async fn authenticate_with_token(&self, token: &str) -> Option<(String, Option<String>)> {
        let claims = match self.identity.validate_token(token) {
            Ok(claims) => claims,
            Err(IdentityError::MalformedToken(e)) => {
                tracing::warn!("Malformed access token: {}", e);
                self.reply_error("error parsing the access token");
                return None;
            }
            Err(e) => {
                tracing::warn!("Token validation failed: {}", e);
                self.reply_error("the access token is expired or invalid");
                return None;
            }
        };

        let Some(user_id) = claims.sub else {
            self.reply_error("could not find user with given token (maybe token from different environment?)");
            return None;
        };

        let nickname = self.lookup_nickname(&user_id, token).await;
        Some((user_id, nickname))
    }

    /// The nickname is decoration; a failed profile fetch never blocks login.
    async fn lookup_nickname(&self, user_id: &str, access_token: &str) -> Option<String> {
        match self.identity.fetch_profile(user_id, access_token).await {
            Ok(profile) => profile.nickname,
            Err(e) => {
                tracing::warn!("Failed to fetch profile for '{}': {}", user_id, e);
                None
            }
        }
    }

    async fn handle_message(&self, content: &Map<String, Value>) {
        let AuthState::Authenticated { user_id, nickname } = &self.state else {
            return;
        };

        let outgoing = build_broadcast(content, user_id, nickname.as_deref(), self.clock.now_unix());
        if let Err(e) = self.chat_log.append(outgoing.to_string()).await {
            tracing::warn!("Failed to record chat message: {}", e);
        }
        tracing::info!(
            "user:{}|message:{}",
            user_id,
            content.get("message").and_then(serde_json::Value::as_str).unwrap_or("")
        );
        if let Err(e) = self.hub.broadcast(CHAT_GROUP, &outgoing).await {
            tracing::error!("Failed to broadcast chat message: {}", e);
        }
    }

    async fn handle_history(&self, content: &Map<String, Value>) {
        let limit = content
            .get("limit")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        let entries = match self.chat_log.recent(limit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Failed to load chat history: {}", e);
                self.reply_error("could not load chat history");
                return;
            }
        };

        let messages: Vec<Value> = entries
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Skipping unparsable history entry: {}", e);
                    None
                }
            })
            .collect();
        self.reply(json!({ "history": messages }));
    }
}

#[async_trait]
impl SessionHandler for ChatSession {
    async fn on_connect(&mut self) {
        tracing::debug!("Chat connection '{}' opened", self.conn);
    }

    async fn on_message(&mut self, raw: &str) {
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Discarding unparsable frame from '{}': {}", self.conn, e);
                self.reply_error("message is not a valid JSON object");
                return;
            }
        };
        let Some(content) = parsed.as_object() else {
            tracing::warn!("Discarding non-object frame from '{}'", self.conn);
            self.reply_error("message is not a valid JSON object");
            return;
        };

        let action = content.get("action").and_then(Value::as_str).unwrap_or_default();

        if !self.state.is_authenticated() {
            if action == "login" {
                self.handle_login(content).await;
            } else {
                self.reply_error("you need to authenticate first");
            }
            return;
        }

        match action {
            "message" => self.handle_message(content).await,
            "history" => self.handle_history(content).await,
            other => tracing::debug!("Unknown action '{}' from '{}'", other, self.conn),
        }
    }

    async fn on_disconnect(&mut self) {
        if let AuthState::Authenticated { user_id, .. } = &self.state {
            self.online.remove(user_id).await;
            tracing::info!("user:{}|action:disconnected", user_id);
        }
        self.hub.leave(CHAT_GROUP, &self.conn).await;
    }
}
