//! Per-bucket allowance tracking

use std::time::Duration;
use tokio::time::Instant;

use super::RateLimitInfo;

/// Remaining allowance and reset time for one bucket.
///
/// Server buckets learn their numbers from response headers. Client buckets
/// are fixed windows: `limit` calls per `window`, the window opening on the
/// first call after a reset. The client-wide pause is tracked by the
/// dispatcher itself, not by a bucket.
#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    window: Option<Duration>,
}

impl RateLimitBucket {
    /// Bucket with no known limits yet
    pub fn unbounded() -> Self {
        Self {
            limit: None,
            remaining: None,
            reset_at: None,
            window: None,
        }
    }

    /// Fixed-window client bucket
    pub fn fixed_window(limit: u32, window: Duration) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(limit),
            reset_at: None,
            window: Some(window),
        }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn reset_at(&self) -> Option<Instant> {
        self.reset_at
    }

    /// Refill the allowance if the reset time has passed
    pub fn refresh(&mut self, now: Instant) {
        if self.reset_at.is_some_and(|reset| reset <= now) {
            self.reset_at = None;
            self.remaining = self.limit;
        }
    }

    /// Time the next call must wait for, if the bucket is exhausted
    pub fn blocked_until(&mut self, now: Instant) -> Option<Instant> {
        self.refresh(now);
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset)) if reset > now => Some(reset),
            _ => None,
        }
    }

    /// Charge one call against the bucket
    pub fn consume(&mut self, now: Instant) {
        if let (Some(window), None) = (self.window, self.reset_at) {
            self.reset_at = Some(now + window);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Apply the accounting a response reported
    pub fn update(&mut self, info: &RateLimitInfo, now: Instant) {
        if let Some(limit) = info.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = info.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = info.reset_after {
            self.reset_at = Some(now + reset_after);
        }
    }

    /// Force the bucket closed for `wait`; overrides any local estimate
    pub fn cooldown(&mut self, wait: Duration, now: Instant) {
        self.remaining = Some(0);
        self.reset_at = Some(now + wait);
    }
}

impl Default for RateLimitBucket {
    fn default() -> Self {
        Self::unbounded()
    }
}
