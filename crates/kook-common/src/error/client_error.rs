//! Client error type
//!
//! Unified error surfaced to applications. Lower crates convert their own
//! error enums into this one.

use kook_core::DomainError;
use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;

/// Application-facing error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Request errors
    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Rate limited on bucket {bucket} (retry after {retry_after:?})")]
    RateLimited { bucket: String, retry_after: Duration },

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    // Connection errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Session stopped")]
    SessionStopped,

    // Data errors
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl ClientError {
    /// Stable error code string
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Http { .. } => "HTTP_ERROR",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::SessionStopped => "SESSION_STOPPED",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Domain(e) => e.code(),
        }
    }

    /// Whether the caller may reasonably try the same operation again
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    /// Create a decode error
    #[must_use]
    pub fn decode(msg: impl fmt::Display) -> Self {
        Self::Decode(msg.to_string())
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
