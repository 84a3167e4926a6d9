//! Dispatcher errors

use kook_common::ClientError;
use std::time::Duration;
use thiserror::Error;

/// Terminal outcome of a queued request
#[derive(Debug, Clone, Error)]
pub enum RestError {
    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Rate limited on bucket {bucket} (retry after {retry_after:?})")]
    RateLimited { bucket: String, retry_after: Duration },

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        /// Service error code from the JSON body, when present
        code: Option<i64>,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<RestError> },
}

impl RestError {
    /// Connection-level failures and upstream gateway timeouts
    pub fn is_timeout_class(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<RestError> for ClientError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Timeout => Self::Timeout,
            RestError::Cancelled => Self::Cancelled,
            RestError::RateLimited { bucket, retry_after } => Self::RateLimited { bucket, retry_after },
            RestError::Http { status, code, message } => Self::Http { status, code, message },
            RestError::Transport(e) => Self::Transport(e),
            RestError::Decode(e) => Self::Decode(e),
            RestError::RetriesExhausted { attempts, last } => Self::RetriesExhausted {
                attempts,
                last: last.to_string(),
            },
        }
    }
}

/// Result type alias for dispatcher operations
pub type RestResult<T> = Result<T, RestError>;
