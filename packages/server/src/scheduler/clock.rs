//! Cancelable fixed-period background timer.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Runs a callback every `period`, starting one period after arming.
///
/// A tick that returns an error is logged and does not stop the timer;
/// cancellation happens through [`BackgroundClock::stop`]. Arming an already
/// armed clock replaces the running timer.
pub struct BackgroundClock {
    timer: Option<(JoinHandle<()>, watch::Sender<bool>)>,
}

impl BackgroundClock {
    pub fn new() -> Self {
        Self { timer: None }
    }

    pub fn start<F, Fut, E>(&mut self, period: Duration, mut callback: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send,
        E: Display,
    {
        self.stop();

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            // first tick fires one full period from now
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = callback().await {
                            tracing::error!("Scheduled tick failed: {}", e);
                        }
                    }
                    _ = cancel_rx.changed() => {
                        tracing::debug!("Background clock canceled");
                        break;
                    }
                }
            }
        });
        self.timer = Some((handle, cancel_tx));
    }

    /// Cancel the running timer, letting an in-flight tick finish.
    pub fn stop(&mut self) {
        if let Some((_handle, cancel_tx)) = self.timer.take() {
            let _ = cancel_tx.send(true);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer
            .as_ref()
            .map(|(handle, _)| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Default for BackgroundClock {
    fn default() -> Self {
        Self::new()
    }
}
