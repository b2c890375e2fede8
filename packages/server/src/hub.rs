//! Group-based broadcast fan-out.
//!
//! Every websocket connection owns an unbounded outbound channel; the hub
//! keeps named groups of those channels and pushes serialized payloads to
//! every member. Dropping a receiver (socket gone) just skips that member on
//! the next broadcast until the session leaves the group.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::domain::ConnectionId;

/// Group joined by every authenticated chat session.
pub const CHAT_GROUP: &str = "chat";

/// Group joined by every minigame control session.
pub const MINIGAME_GROUP: &str = "minigame";

/// Sender half of a connection's outbound channel.
pub type OutboundSender = mpsc::UnboundedSender<String>;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("failed to serialize payload: {0}")]
    Serialize(String),
}

/// Registry of broadcast groups and their member channels.
pub struct BroadcastHub {
    groups: Mutex<HashMap<String, HashMap<ConnectionId, OutboundSender>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Add a connection to a group. Rejoining replaces the stored sender.
    pub async fn join(&self, group: &str, conn: ConnectionId, sender: OutboundSender) {
        let mut groups = self.groups.lock().await;
        groups.entry(group.to_string()).or_default().insert(conn.clone(), sender);
        tracing::debug!("Connection '{}' joined group '{}'", conn, group);
    }

    /// Remove a connection from a group. Unknown members are ignored.
    pub async fn leave(&self, group: &str, conn: &ConnectionId) {
        let mut groups = self.groups.lock().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(conn);
            if members.is_empty() {
                groups.remove(group);
            }
        }
        tracing::debug!("Connection '{}' left group '{}'", conn, group);
    }

    pub async fn member_count(&self, group: &str) -> usize {
        let groups = self.groups.lock().await;
        groups.get(group).map(HashMap::len).unwrap_or(0)
    }

    /// Serialize `payload` once and push it to every member of `group`.
    ///
    /// Members whose channel is closed are skipped with a warning; a group
    /// with no members is not an error.
    pub async fn broadcast(&self, group: &str, payload: &Value) -> Result<(), PushError> {
        let message =
            serde_json::to_string(payload).map_err(|e| PushError::Serialize(e.to_string()))?;

        let groups = self.groups.lock().await;
        let Some(members) = groups.get(group) else {
            tracing::debug!("No members in group '{}', dropping broadcast", group);
            return Ok(());
        };

        for (conn, sender) in members.iter() {
            if sender.send(message.clone()).is_err() {
                tracing::warn!("Failed to push to connection '{}', channel closed", conn);
            }
        }
        Ok(())
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn member() -> (ConnectionId, OutboundSender, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionId::generate(), tx, rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        // given: two members of the same group
        let hub = BroadcastHub::new();
        let (conn_a, tx_a, mut rx_a) = member();
        let (conn_b, tx_b, mut rx_b) = member();
        hub.join("room", conn_a, tx_a).await;
        hub.join("room", conn_b, tx_b).await;

        // when:
        hub.broadcast("room", &json!({ "info": "hello" })).await.unwrap();

        // then:
        assert_eq!(rx_a.recv().await.unwrap(), r#"{"info":"hello"}"#);
        assert_eq!(rx_b.recv().await.unwrap(), r#"{"info":"hello"}"#);
    }

    #[tokio::test]
    async fn test_leave_stops_delivery() {
        // given:
        let hub = BroadcastHub::new();
        let (conn, tx, mut rx) = member();
        hub.join("room", conn.clone(), tx).await;

        // when:
        hub.leave("room", &conn).await;
        hub.broadcast("room", &json!({ "info": "gone" })).await.unwrap();

        // then: nothing is queued
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.member_count("room").await, 0);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        // given:
        let hub = BroadcastHub::new();
        let (conn, tx, _rx) = member();
        hub.join("room", conn.clone(), tx).await;

        // when: leaving twice
        hub.leave("room", &conn).await;
        hub.leave("room", &conn).await;

        // then:
        assert_eq!(hub.member_count("room").await, 0);
    }

    #[tokio::test]
    async fn test_rejoin_replaces_the_sender() {
        // given: a member that rejoins with a fresh channel
        let hub = BroadcastHub::new();
        let conn = ConnectionId::generate();
        let (tx_old, mut rx_old) = mpsc::unbounded_channel();
        let (tx_new, mut rx_new) = mpsc::unbounded_channel();
        hub.join("room", conn.clone(), tx_old).await;
        hub.join("room", conn, tx_new).await;

        // when:
        hub.broadcast("room", &json!({ "info": "again" })).await.unwrap();

        // then: only the fresh channel receives
        assert_eq!(hub.member_count("room").await, 1);
        assert!(rx_old.try_recv().is_err());
        assert!(rx_new.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_group_is_ok() {
        let hub = BroadcastHub::new();
        assert!(hub.broadcast("nowhere", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        // given:
        let hub = BroadcastHub::new();
        let (conn, tx, mut rx) = member();
        hub.join("room", conn, tx).await;

        // when:
        for n in 0..3 {
            hub.broadcast("room", &json!({ "n": n })).await.unwrap();
        }

        // then:
        for n in 0..3 {
            assert_eq!(rx.recv().await.unwrap(), format!(r#"{{"n":{}}}"#, n));
        }
    }

    #[tokio::test]
    async fn test_dead_member_does_not_block_the_rest() {
        // given: one member whose receiver is already dropped
        let hub = BroadcastHub::new();
        let (conn_dead, tx_dead, rx_dead) = member();
        let (conn_live, tx_live, mut rx_live) = member();
        drop(rx_dead);
        hub.join("room", conn_dead, tx_dead).await;
        hub.join("room", conn_live, tx_live).await;

        // when:
        hub.broadcast("room", &json!({ "info": "still here" })).await.unwrap();

        // then: the live member still receives
        assert!(rx_live.try_recv().is_ok());
    }
}
