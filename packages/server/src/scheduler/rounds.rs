//! Round lifecycle: opening on a timer, tracking balances, settling results.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Mutex;

use pavilion_shared::time::Clock;

use crate::domain::round::{
    MIN_PLAYERS, MinigameKind, RoundSummary, draft_roster, next_round_number, round_id,
};
use crate::domain::settlement::{SettleError, settle_leaderboard};
use crate::hub::{BroadcastHub, MINIGAME_GROUP, PushError};
use crate::online::OnlineRegistry;
use crate::scheduler::BackgroundClock;

/// Default seconds between round openings.
pub const DEFAULT_PERIOD: u64 = 600;

/// Default seconds between a round's announcement and its start.
pub const DEFAULT_OFFSET: u64 = 300;

/// Live round bookkeeping, shared by the timer task and control sessions.
struct MinigameState {
    open_rounds: HashSet<String>,
    balances: HashMap<String, f64>,
    latest: RoundSummary,
}

impl MinigameState {
    fn new() -> Self {
        Self {
            open_rounds: HashSet::new(),
            balances: HashMap::new(),
            latest: RoundSummary::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScheduleSettings {
    period: u64,
    offset: u64,
    next_kind: MinigameKind,
}

/// Opens a minigame round every period and settles finished rounds.
///
/// Cloning is cheap; all clones share the same state. Settings survive a
/// [`RoundScheduler::stop`] so finished rounds can still be settled while
/// the timer is down.
#[derive(Clone)]
pub struct RoundScheduler {
    hub: Arc<BroadcastHub>,
    online: Arc<OnlineRegistry>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<MinigameState>>,
    settings: Arc<Mutex<Option<ScheduleSettings>>>,
    timer: Arc<Mutex<BackgroundClock>>,
}

impl RoundScheduler {
    pub fn new(hub: Arc<BroadcastHub>, online: Arc<OnlineRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            hub,
            online,
            clock,
            state: Arc::new(Mutex::new(MinigameState::new())),
            settings: Arc::new(Mutex::new(None)),
            timer: Arc::new(Mutex::new(BackgroundClock::new())),
        }
    }

    /// Open the next round: draft from the online pool, reset balances and
    /// tell the minigame group to refetch.
    pub async fn tick(&self) -> Result<(), PushError> {
        let (kind, offset) = {
            let mut settings = self.settings.lock().await;
            let Some(current) = settings.as_mut() else {
                tracing::debug!("Scheduler has no settings, skipping tick");
                return Ok(());
            };
            let kind = current.next_kind;
            current.next_kind = kind.other();
            (kind, current.offset)
        };

        let pool = self.online.snapshot().await;
        let now = self.clock.now_unix();

        {
            let mut state = self.state.lock().await;
            state.balances = pool.iter().map(|id| (id.clone(), 0.0)).collect();
            let number = next_round_number(&state.latest.id);
            let id = round_id(number);
            state.open_rounds.insert(id.clone());
            tracing::info!(
                "Opened round '{}' ({}) with {} online player(s)",
                id,
                kind.as_str(),
                pool.len()
            );
            state.latest = RoundSummary {
                id,
                kind,
                registration_start: now,
                registration_end: now,
                start_at: now + offset as i64,
                roster: draft_roster(&pool),
                enough_players: pool.len() >= MIN_PLAYERS,
            };
        }

        self.hub.broadcast(MINIGAME_GROUP, &json!({ "info": "update" })).await
    }

    /// Open a round right away, then keep opening one every `period` seconds.
    pub async fn start(&self, period: u64, offset: u64) {
        {
            let mut settings = self.settings.lock().await;
            *settings = Some(ScheduleSettings {
                period,
                offset,
                next_kind: MinigameKind::Blitz,
            });
        }
        if let Err(e) = self.tick().await {
            tracing::error!("Failed to announce the opening round: {}", e);
        }

        let scheduler = self.clone();
        {
            let mut timer = self.timer.lock().await;
            timer.start(Duration::from_secs(period), move || {
                let scheduler = scheduler.clone();
                async move { scheduler.tick().await }
            });
        }
        tracing::info!("Scheduler started with period {}s, offset {}s", period, offset);
        self.notify(json!({ "info": "scheduler is running" })).await;
    }

    /// Stop the timer. Settings and open rounds stay in place, so stopping
    /// never blocks settlement. Stopping an idle scheduler is silent.
    pub async fn stop(&self) {
        {
            let mut timer = self.timer.lock().await;
            if !timer.is_armed() {
                tracing::debug!("Scheduler is not running, nothing to stop");
                return;
            }
            timer.stop();
        }
        tracing::info!("Scheduler stopped");
        self.notify(json!({ "info": "scheduler is stopped" })).await;
    }

    /// Push the current schedule to the minigame group.
    pub async fn info(&self) {
        let settings = *self.settings.lock().await;
        let armed = self.timer.lock().await.is_armed();
        match settings {
            Some(current) if armed => {
                self.notify(json!({
                    "info": "scheduler is running",
                    "period": current.period,
                    "offset": current.offset,
                }))
                .await;
            }
            _ => {
                self.notify(json!({ "info": "scheduler is not running" })).await;
            }
        }
    }

    /// Close an open round and pay out its leaderboard.
    ///
    /// Returns the annotated leaderboard on success. A failed settlement
    /// leaves the round open.
    pub async fn settle(
        &self,
        round_id: &str,
        mut leaderboard: Vec<Value>,
    ) -> Result<Vec<Value>, SettleError> {
        if self.settings.lock().await.is_none() {
            return Err(SettleError::SchedulerNotRunning);
        }

        let mut state = self.state.lock().await;
        if !state.open_rounds.contains(round_id) {
            return Err(SettleError::RoundNotFound(round_id.to_string()));
        }
        settle_leaderboard(&mut leaderboard, &mut state.balances)?;
        state.open_rounds.remove(round_id);
        tracing::info!(
            "Settled round '{}' with {} ranked player(s)",
            round_id,
            leaderboard.len()
        );
        Ok(leaderboard)
    }

    pub async fn log_online_players(&self) {
        if self.settings.lock().await.is_none() {
            return;
        }
        let state = self.state.lock().await;
        tracing::info!("Player pool: {:?}", state.balances);
    }

    /// Most recently opened round, or the placeholder before the first tick.
    pub async fn latest_round(&self) -> RoundSummary {
        self.state.lock().await.latest.clone()
    }

    async fn notify(&self, payload: Value) {
        if let Err(e) = self.hub.broadcast(MINIGAME_GROUP, &payload).await {
            tracing::error!("Failed to push scheduler notice: {}", e);
        }
    }

    #[cfg(test)]
    pub async fn balance_of(&self, user_id: &str) -> Option<f64> {
        self.state.lock().await.balances.get(user_id).copied()
    }
}
