//! Connection identity, authentication state and the chat message envelope.

use serde_json::{Map, Value};
use uuid::Uuid;

/// Opaque identifier of one live websocket connection.
///
/// Stable for the lifetime of the connection and unrelated to the platform
/// user identity resolved during login, so two connections of the same user
/// never collide in a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh connection id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authentication state of one connection.
///
/// The only transition is `Unauthenticated -> Authenticated`; a session
/// never falls back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated {
        user_id: String,
        nickname: Option<String>,
    },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

/// Build the broadcast form of an inbound chat payload.
///
/// Strips the routing `action` field and stamps `user_id`, `timestamp` and
/// `nickname` server-side, overriding any client-supplied values of the same
/// name. A present, non-null `channel` tag is coerced to a string.
pub fn build_broadcast(
    payload: &Map<String, Value>,
    user_id: &str,
    nickname: Option<&str>,
    timestamp: i64,
) -> Value {
    let mut message = payload.clone();
    message.remove("action");
    message.insert("user_id".to_string(), Value::from(user_id));
    message.insert("timestamp".to_string(), Value::from(timestamp));
    message.insert(
        "nickname".to_string(),
        nickname.map_or(Value::Null, Value::from),
    );

    let coerced_channel = match message.get("channel") {
        Some(value) if !value.is_null() && !value.is_string() => {
            Some(Value::String(value.to_string()))
        }
        _ => None,
    };
    if let Some(channel) = coerced_channel {
        message.insert("channel".to_string(), channel);
    }

    Value::Object(message)
}
