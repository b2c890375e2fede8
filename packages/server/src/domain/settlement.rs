//! Prize settlement for finished minigame rounds.
//!
//! Pure computation over the leaderboard a game server reports at round end;
//! no I/O happens here. The scheduler owns the balance pool this fold
//! mutates.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Base amount every prize pool starts from.
pub const BASE_POOL_AMOUNT: f64 = 1000.0;

/// Per-player entry fee added to the pool.
pub const PLAYER_FEE: f64 = 100.0;

/// Fractional prize share by final position. Unmapped positions win nothing.
pub const WIN_SPLIT: [(u64, f64); 5] = [(1, 0.36), (2, 0.26), (3, 0.18), (4, 0.12), (5, 0.08)];

/// Settlement failures, in the order they are checked.
#[derive(Debug, Error, PartialEq)]
pub enum SettleError {
    #[error("scheduler not running")]
    SchedulerNotRunning,
    #[error("game with id {0} not found in list of running games")]
    RoundNotFound(String),
    #[error("leaderboard is empty")]
    EmptyLeaderboard,
    #[error("position not found for player id {0}")]
    MissingPosition(String),
    #[error("player id {0} not found in the pool of existing players")]
    UnknownPlayer(String),
}

/// Share of the pool won at `position`.
pub fn win_share(position: u64) -> f64 {
    WIN_SPLIT
        .iter()
        .find(|(rank, _)| *rank == position)
        .map(|(_, share)| *share)
        .unwrap_or(0.0)
}

/// Total pool for a round with `player_count` ranked players.
pub fn total_pool(player_count: usize) -> f64 {
    BASE_POOL_AMOUNT + player_count as f64 * PLAYER_FEE
}

/// Fold a leaderboard into the balance pool.
///
/// Entries are processed in input order. Each must carry a `position` field
/// and refer to a tracked player; the first violation abandons the remaining
/// entries while balances already credited stay in place. Every processed
/// entry loses its `position` field and gains `won` and `balance`.
pub fn settle_leaderboard(
    leaderboard: &mut [Value],
    balances: &mut HashMap<String, f64>,
) -> Result<(), SettleError> {
    if leaderboard.is_empty() {
        return Err(SettleError::EmptyLeaderboard);
    }

    let pool = total_pool(leaderboard.len());
    for entry in leaderboard.iter_mut() {
        let player_id = entry
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let position = match entry.as_object_mut().and_then(|obj| obj.remove("position")) {
            Some(position) => position,
            None => return Err(SettleError::MissingPosition(player_id)),
        };

        // non-integer positions win a zero share
        let share = position.as_u64().map(win_share).unwrap_or(0.0);
        let won = pool * share;

        let balance = match balances.get_mut(&player_id) {
            Some(balance) => {
                *balance += won;
                *balance
            }
            None => return Err(SettleError::UnknownPlayer(player_id)),
        };

        if let Some(obj) = entry.as_object_mut() {
            obj.insert("won".to_string(), Value::from(won));
            obj.insert("balance".to_string(), Value::from(balance));
        }
    }

    Ok(())
}
