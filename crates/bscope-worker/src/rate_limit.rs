//! Process-wide inference pause barrier.
//!
//! A throttling signal from the backend pauses every in-flight worker for
//! the same window instead of letting each one re-trigger its own timer.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Shared pause barrier. The deadline only ever moves forward.
#[derive(Debug)]
pub struct RateGate {
    pause: Duration,
    pause_until: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            pause_until: Mutex::new(None),
        }
    }

    /// Block until the current pause window (if any) has passed.
    ///
    /// Concurrent waiters each sleep toward the same shared deadline; the
    /// re-check after waking covers a deadline extended mid-sleep.
    pub async fn wait_if_paused(&self) {
        loop {
            let deadline = *self.pause_until.lock().expect("rate gate lock poisoned");
            match deadline {
                Some(until) if until > Instant::now() => tokio::time::sleep_until(until).await,
                _ => return,
            }
        }
    }

    /// Extend the pause window to `now + pause`. Never shortens an
    /// already-later deadline.
    pub fn trigger_pause(&self, label: &str) {
        let until = Instant::now() + self.pause;
        let mut guard = self.pause_until.lock().expect("rate gate lock poisoned");
        match *guard {
            Some(existing) if existing >= until => {
                debug!("{}: rate-limit pause already active", label);
            }
            _ => {
                *guard = Some(until);
                warn!(
                    "{}: backend throttled, pausing inference for {:?}",
                    label, self.pause
                );
            }
        }
    }
}
