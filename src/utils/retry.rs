// Reconnect backoff for the cache store supervisor
// Author: kelexine (https://github.com/kelexine)

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::time::Duration;

/// Create exponential backoff configuration for reconnect attempts.
///
/// Never gives up: the cache is optional, so the supervisor keeps trying in
/// the background for the lifetime of the process.
pub fn create_backoff(max_interval: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(500),
        initial_interval: Duration::from_millis(500),
        randomization_factor: 0.3,
        multiplier: 2.0,
        max_interval,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Delay schedule between connection attempts.
pub struct ReconnectSchedule {
    backoff: ExponentialBackoff,
    max_interval: Duration,
    attempts: u32,
}

impl ReconnectSchedule {
    pub fn new(max_interval: Duration) -> Self {
        Self {
            backoff: create_backoff(max_interval),
            max_interval,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.attempts += 1;
        self.backoff.next_backoff().unwrap_or(self.max_interval)
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over after a successful connection
    pub fn reset(&mut self) {
        self.backoff.reset();
        self.attempts = 0;
    }
}
