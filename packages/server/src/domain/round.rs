//! Minigame round data, the round id cycle and the variant alternation.

use rand::Rng;
use serde_json::{Value, json};

/// Prefix of every round id.
pub const ROUND_ID_PREFIX: &str = "PAV-";

/// Largest numeric suffix before the round id cycle wraps back to 1.
pub const ROUND_ID_CYCLE: i64 = 3;

/// Maximum players drafted into a round roster.
pub const MAX_ROSTER: usize = 10;

/// Minimum pool size for a round to be playable.
pub const MIN_PLAYERS: usize = 2;

/// The two minigame variants, announced alternately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinigameKind {
    Blitz,
    Spinner,
}

impl MinigameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MinigameKind::Blitz => "blitz",
            MinigameKind::Spinner => "spinner",
        }
    }

    /// The variant announced after this one.
    pub fn other(self) -> Self {
        match self {
            MinigameKind::Blitz => MinigameKind::Spinner,
            MinigameKind::Spinner => MinigameKind::Blitz,
        }
    }
}

/// Compute the round number following `latest_id`.
///
/// The trailing numeric suffix cycles 1, 2, 3, 1, ...; a suffix that does
/// not parse counts as 0.
pub fn next_round_number(latest_id: &str) -> i64 {
    let suffix = latest_id
        .rsplit('-')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);
    if suffix >= ROUND_ID_CYCLE { 1 } else { suffix + 1 }
}

/// Render a round id from its cycle number.
pub fn round_id(number: i64) -> String {
    format!("{}{}", ROUND_ID_PREFIX, number)
}

/// Draft up to [`MAX_ROSTER`] players from the pool, uniformly without
/// replacement.
pub fn draft_roster(pool: &[String]) -> Vec<String> {
    let mut available = pool.to_vec();
    let mut rng = rand::thread_rng();
    let count = available.len().min(MAX_ROSTER);
    let mut roster = Vec::with_capacity(count);
    for _ in 0..count {
        let idx = rng.gen_range(0..available.len());
        roster.push(available.swap_remove(idx));
    }
    roster
}

/// Snapshot of the most recently announced round.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub id: String,
    pub kind: MinigameKind,
    pub registration_start: i64,
    pub registration_end: i64,
    pub start_at: i64,
    pub roster: Vec<String>,
    pub enough_players: bool,
}

impl Default for RoundSummary {
    fn default() -> Self {
        Self {
            id: round_id(0),
            kind: MinigameKind::Blitz,
            registration_start: 0,
            registration_end: 0,
            start_at: 0,
            roster: Vec::new(),
            enough_players: true,
        }
    }
}

impl RoundSummary {
    /// Public projection served on the gaming events endpoint.
    ///
    /// Profile fields and the settings block are placeholders that connected
    /// game servers expect to be present, not data this server owns.
    pub fn to_event_payload(&self) -> Value {
        let players: Vec<Value> = self
            .roster
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "nickname": "default",
                    "walletAddress": "string",
                })
            })
            .collect();

        json!([{
            "id": self.id,
            "miniGame": self.kind.as_str(),
            "parameters": {
                "startsAt": self.start_at,
                "registrationStartsAt": self.registration_start,
                "registrationEndsAt": self.registration_end,
                "currency": "PVN",
                "entryFee": 200,
                "rewardPool": 50000,
            },
            "settings": {
                "numberOfLaps": 20,
                "numberOfPlayers": 10,
                "map": "default map",
            },
            "players": players,
            "enoughPlayers": self.enough_players,
            "results": null,
            "policyLink": "string",
        }])
    }
}
