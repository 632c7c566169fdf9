//! Debounce window for watch events.
//!
//! A single "last accepted" timestamp scoped to the watch loop. Any event
//! arriving within `interval` of the last accepted one is dropped, whatever
//! its path.

use std::time::Duration;

use tokio::time::Instant;

use crate::settings::DEBOUNCE_WINDOW;

#[derive(Debug, Clone)]
pub struct Debounce {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl Debounce {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records `now` if the event should be processed.
    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) <= self.interval => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}
