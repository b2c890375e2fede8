//! Minigame control protocol: scheduler commands and round settlement.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::domain::ConnectionId;
use crate::hub::{BroadcastHub, MINIGAME_GROUP, OutboundSender};
use crate::scheduler::{DEFAULT_OFFSET, DEFAULT_PERIOD, RoundScheduler};
use crate::session::{SessionHandler, send_reply};

/// One minigame control connection.
///
/// Game servers and dashboards speak this protocol; there is no login step,
/// the connection joins the minigame group as soon as it opens. Errors go
/// back to the requester only, round updates and settled balances go to the
/// whole group.
pub struct MinigameControlSession {
    conn: ConnectionId,
    hub: Arc<BroadcastHub>,
    scheduler: RoundScheduler,
    sender: OutboundSender,
}

impl MinigameControlSession {
    pub fn new(
        conn: ConnectionId,
        hub: Arc<BroadcastHub>,
        scheduler: RoundScheduler,
        sender: OutboundSender,
    ) -> Self {
        Self {
            conn,
            hub,
            scheduler,
            sender,
        }
    }

    fn reply_error(&self, message: &str) {
        send_reply(&self.sender, &self.conn, json!({ "error": message }));
    }

    async fn handle_game_end(&self, content: &Map<String, Value>) {
        let round_id = content.get("id").and_then(Value::as_str).unwrap_or_default();
        let leaderboard = content
            .get("leaderboard")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        match self.scheduler.settle(round_id, leaderboard).await {
            Ok(results) => {
                let payload = json!({ "action": "balance_update", "data": results });
                if let Err(e) = self.hub.broadcast(MINIGAME_GROUP, &payload).await {
                    tracing::error!("Failed to broadcast settled balances: {}", e);
                }
            }
            Err(e) => self.reply_error(&e.to_string()),
        }
    }

    async fn handle_scheduler_start(&self, content: &Map<String, Value>) {
        let period = content
            .get("period")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_PERIOD);
        let offset = content
            .get("offset")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_OFFSET);

        if period == 0 {
            self.reply_error("period must be a positive number of seconds");
            return;
        }
        self.scheduler.start(period, offset).await;
    }
}

#[async_trait]
impl SessionHandler for MinigameControlSession {
    async fn on_connect(&mut self) {
        self.hub
            .join(MINIGAME_GROUP, self.conn.clone(), self.sender.clone())
            .await;
        tracing::debug!("Minigame connection '{}' opened", self.conn);
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

        match content.get("action").and_then(Value::as_str).unwrap_or_default() {
            "game_end" => self.handle_game_end(content).await,
            "scheduler_start" => self.handle_scheduler_start(content).await,
            "scheduler_stop" => self.scheduler.stop().await,
            "scheduler_info" => self.scheduler.info().await,
            "online_players" => self.scheduler.log_online_players().await,
            other => tracing::debug!("Unknown action '{}' from '{}'", other, self.conn),
        }
    }

    async fn on_disconnect(&mut self) {
        self.hub.leave(MINIGAME_GROUP, &self.conn).await;
        tracing::warn!("user:{}|action:disconnected", self.conn);
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use tokio::sync::mpsc;

    use pavilion_shared::time::FixedClock;

    use crate::online::OnlineRegistry;

    use super::*;

    struct Harness {
        hub: Arc<BroadcastHub>,
        rx: mpsc::UnboundedReceiver<String>,
        session: MinigameControlSession,
    }

    async fn build_session(users: &[&str]) -> Harness {
        let hub = Arc::new(BroadcastHub::new());
        let online = Arc::new(OnlineRegistry::new());
        for user in users {
            online.insert(user.to_string()).await;
        }
        let scheduler = RoundScheduler::new(hub.clone(), online, Arc::new(FixedClock::new(0)));
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session =
            MinigameControlSession::new(ConnectionId::generate(), hub.clone(), scheduler, tx);
        session.on_connect().await;
        Harness { hub, rx, session }
    }

    fn next_payload(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    async fn start_scheduler(harness: &mut Harness) {
        harness
            .session
            .on_message(r#"{"action":"scheduler_start","period":600,"offset":60}"#)
            .await;
        assert_eq!(next_payload(&mut harness.rx), json!({ "info": "update" }));
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({ "info": "scheduler is running" })
        );
    }

    #[tokio::test]
    async fn test_game_end_settles_and_broadcasts_balances() {
        // given: a running scheduler with one player
        let mut harness = build_session(&["a"]).await;
        start_scheduler(&mut harness).await;

        // when: the game server reports the finished round
        harness
            .session
            .on_message(r#"{"action":"game_end","id":"PAV-1","leaderboard":[{"id":"a","position":1}]}"#)
            .await;

        // then: the whole group hears the settled balances
        let payload = next_payload(&mut harness.rx);
        assert_eq!(payload["action"], "balance_update");
        assert_approx_eq!(payload["data"][0]["won"].as_f64().unwrap(), 396.0, 1e-9);
        assert_approx_eq!(payload["data"][0]["balance"].as_f64().unwrap(), 396.0, 1e-9);
    }

    #[tokio::test]
    async fn test_game_end_before_any_start_is_an_error() {
        // given: a scheduler that never ran
        let mut harness = build_session(&["a"]).await;

        // when:
        harness
            .session
            .on_message(r#"{"action":"game_end","id":"PAV-1","leaderboard":[{"id":"a","position":1}]}"#)
            .await;

        // then: the requester alone gets the error
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({ "error": "scheduler not running" })
        );
    }

    #[tokio::test]
    async fn test_game_end_for_unknown_round() {
        // given:
        let mut harness = build_session(&["a"]).await;
        start_scheduler(&mut harness).await;

        // when:
        harness
            .session
            .on_message(r#"{"action":"game_end","id":"PAV-9","leaderboard":[{"id":"a","position":1}]}"#)
            .await;

        // then:
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({ "error": "game with id PAV-9 not found in list of running games" })
        );
    }

    #[tokio::test]
    async fn test_scheduler_start_rejects_a_zero_period() {
        // given:
        let mut harness = build_session(&[]).await;

        // when:
        harness
            .session
            .on_message(r#"{"action":"scheduler_start","period":0}"#)
            .await;

        // then: rejected before anything is announced
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({ "error": "period must be a positive number of seconds" })
        );
        assert!(harness.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scheduler_start_falls_back_to_defaults() {
        // given:
        let mut harness = build_session(&[]).await;

        // when: a bare start, then an info request
        harness.session.on_message(r#"{"action":"scheduler_start"}"#).await;
        assert_eq!(next_payload(&mut harness.rx), json!({ "info": "update" }));
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({ "info": "scheduler is running" })
        );
        harness.session.on_message(r#"{"action":"scheduler_info"}"#).await;

        // then:
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({
                "info": "scheduler is running",
                "period": DEFAULT_PERIOD,
                "offset": DEFAULT_OFFSET,
            })
        );
    }

    #[tokio::test]
    async fn test_scheduler_stop_without_start_is_silent() {
        // given:
        let mut harness = build_session(&[]).await;

        // when:
        harness.session.on_message(r#"{"action":"scheduler_stop"}"#).await;

        // then:
        assert!(harness.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_rejected() {
        let mut harness = build_session(&[]).await;

        harness.session.on_message("nope").await;
        assert_eq!(
            next_payload(&mut harness.rx),
            json!({ "error": "message is not a valid JSON object" })
        );
    }

    #[tokio::test]
    async fn test_unknown_action_is_ignored() {
        let mut harness = build_session(&[]).await;

        harness.session.on_message(r#"{"action":"wat"}"#).await;
        assert!(harness.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_leaves_the_group() {
        // given:
        let mut harness = build_session(&[]).await;
        assert_eq!(harness.hub.member_count(MINIGAME_GROUP).await, 1);

        // when:
        harness.session.on_disconnect().await;

        // then:
        assert_eq!(harness.hub.member_count(MINIGAME_GROUP).await, 0);
    }
}
