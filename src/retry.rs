//! Exponential backoff with jitter for broker reconnection
//!
//! The MQTT client reconnects on the next poll after a failure; this module
//! decides how long the intake loop waits before that poll so a broker outage
//! does not turn into a tight reconnect loop.

use crate::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

/// Tracks consecutive failures and produces the delay before the next attempt
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    /// Create a backoff starting at the configured initial delay
    pub fn new(config: ReconnectConfig) -> Self {
        let next = config.initial_delay;
        Self {
            config,
            next,
            attempts: 0,
        }
    }

    /// Delay to wait now; advances the schedule for the next failure
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.attempts = self.attempts.saturating_add(1);

        // Out-of-range products (negative, NaN, overflow) clamp to the cap
        let grown = Duration::try_from_secs_f64(delay.as_secs_f64() * self.config.backoff_multiplier)
            .unwrap_or(self.config.max_delay);
        self.next = grown.min(self.config.max_delay);

        if self.config.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }

    /// Consecutive failures since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget previous failures (called after a successful connection)
    pub fn reset(&mut self) {
        self.next = self.config.initial_delay;
        self.attempts = 0;
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
