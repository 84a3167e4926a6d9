//! Rate-limit signal parsed from response headers

use std::collections::HashMap;
use std::time::Duration;

use super::BucketKey;

pub const HEADER_LIMIT: &str = "x-rate-limit-limit";
pub const HEADER_REMAINING: &str = "x-rate-limit-remaining";
pub const HEADER_RESET: &str = "x-rate-limit-reset";
pub const HEADER_BUCKET: &str = "x-rate-limit-bucket";
pub const HEADER_GLOBAL: &str = "x-rate-limit-global";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Snapshot of what the service reported about a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Local bucket the request was queued under
    pub bucket: String,
    /// Bucket name reported by the service, if any
    pub server_bucket: Option<String>,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Time until the bucket refills
    pub reset_after: Option<Duration>,
    /// Explicit cooldown requested by a throttling response
    pub retry_after: Option<Duration>,
    /// Applies to every bucket of this client
    pub global: bool,
}

impl RateLimitInfo {
    /// Parse the rate-limit headers of a response.
    ///
    /// `headers` keys are expected lowercased.
    pub fn from_headers(bucket: &BucketKey, headers: &HashMap<String, String>) -> Self {
        Self {
            bucket: bucket.to_string(),
            server_bucket: headers.get(HEADER_BUCKET).cloned(),
            limit: headers.get(HEADER_LIMIT).and_then(|v| v.trim().parse().ok()),
            remaining: headers.get(HEADER_REMAINING).and_then(|v| v.trim().parse().ok()),
            reset_after: headers.get(HEADER_RESET).and_then(|v| parse_seconds(v)),
            retry_after: headers.get(HEADER_RETRY_AFTER).and_then(|v| parse_seconds(v)),
            global: headers.get(HEADER_GLOBAL).is_some_and(|v| parse_flag(v)),
        }
    }

    /// Whether the response carried any bucket accounting
    pub fn has_limits(&self) -> bool {
        self.limit.is_some() || self.remaining.is_some() || self.reset_after.is_some()
    }

    /// Wait requested by a throttling response, falling back to the reset time
    pub fn cooldown(&self) -> Option<Duration> {
        self.retry_after.or(self.reset_after)
    }
}

/// `true`/`1` in any case; anything else is false
fn parse_flag(raw: &str) -> bool {
    let raw = raw.trim();
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}
