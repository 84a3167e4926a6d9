//! Retry policy for outbound requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which failure classes a request is allowed to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Fail on the first error
    Never,
    /// Retry connection failures and upstream timeouts
    RetryTimeouts,
    /// Retry throttling responses after the requested cooldown
    RetryRateLimits,
    /// Retry both classes
    #[default]
    Always,
}

impl RetryMode {
    #[must_use]
    pub const fn retries_timeouts(self) -> bool {
        matches!(self, Self::RetryTimeouts | Self::Always)
    }

    #[must_use]
    pub const fn retries_rate_limits(self) -> bool {
        matches!(self, Self::RetryRateLimits | Self::Always)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::RetryTimeouts => "retry_timeouts",
            Self::RetryRateLimits => "retry_rate_limits",
            Self::Always => "always",
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "retry_timeouts" | "timeouts" => Ok(Self::RetryTimeouts),
            "retry_rate_limits" | "rate_limits" => Ok(Self::RetryRateLimits),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown retry mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classes() {
        assert!(!RetryMode::Never.retries_timeouts());
        assert!(!RetryMode::Never.retries_rate_limits());
        assert!(RetryMode::RetryTimeouts.retries_timeouts());
        assert!(!RetryMode::RetryTimeouts.retries_rate_limits());
        assert!(!RetryMode::RetryRateLimits.retries_timeouts());
        assert!(RetryMode::RetryRateLimits.retries_rate_limits());
        assert!(RetryMode::Always.retries_timeouts());
        assert!(RetryMode::Always.retries_rate_limits());
    }

    #[test]
    fn test_retry_mode_from_str() {
        assert_eq!("never".parse::<RetryMode>(), Ok(RetryMode::Never));
        assert_eq!("Rate_Limits".parse::<RetryMode>(), Ok(RetryMode::RetryRateLimits));
        assert!("sometimes".parse::<RetryMode>().is_err());
    }
}
