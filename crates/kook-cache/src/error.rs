//! Cache errors

use kook_common::ClientError;
use kook_core::Snowflake;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Invalid limit: {0} (must not be negative)")]
    InvalidLimit(i64),

    #[error("Guild not cached: {0}")]
    GuildNotFound(Snowflake),
}

impl From<CacheError> for ClientError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
