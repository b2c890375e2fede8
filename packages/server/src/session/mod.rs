//! Per-connection protocol state machines.
//!
//! A session owns everything one websocket connection is allowed to do. The
//! transport layer drives it through [`SessionHandler`]; replies that should
//! reach only this connection go straight out its own channel, everything
//! else goes through the hub.

mod chat;
mod minigame;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ConnectionId;
use crate::hub::OutboundSender;

pub use chat::ChatSession;
pub use minigame::MinigameControlSession;

/// Connection lifecycle hooks driven by the websocket transport.
#[async_trait]
pub trait SessionHandler: Send {
    async fn on_connect(&mut self);
    async fn on_message(&mut self, raw: &str);
    async fn on_disconnect(&mut self);
}

/// Queue a payload on this connection's own outbound channel.
pub(crate) fn send_reply(sender: &OutboundSender, conn: &ConnectionId, payload: Value) {
    if sender.send(payload.to_string()).is_err() {
        tracing::debug!("Reply to '{}' dropped, channel closed", conn);
    }
}
