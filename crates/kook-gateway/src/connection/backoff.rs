//! Reconnect delay schedule: exponential, capped, jittered

use kook_common::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
    jitter: bool,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32, jitter: bool) -> Self {
        Self {
            initial,
            max: max.max(initial),
            max_attempts,
            jitter,
            attempt: 0,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
            config.jitter,
        )
    }

    /// Attempts consumed since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt.min(31)).unwrap_or(u32::MAX);
        let base = self.initial.saturating_mul(factor).min(self.max);
        self.attempt += 1;

        if !self.jitter {
            return Some(base);
        }
        // Equal jitter: half fixed, half random
        let millis = base.as_millis() as u64;
        let half = millis / 2;
        Some(Duration::from_millis(rand::thread_rng().gen_range(half..=millis)))
    }

    /// Called once a connection reaches `Connected`
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
