//! Periodic minigame round scheduling.

mod clock;
mod rounds;

pub use clock::BackgroundClock;
pub use rounds::{DEFAULT_OFFSET, DEFAULT_PERIOD, RoundScheduler};
