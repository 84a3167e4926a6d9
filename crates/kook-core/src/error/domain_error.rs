//! Domain errors - failures decoding or validating entity records

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Guild not found: {0}")]
    GuildNotFound(Snowflake),

    #[error("Channel not found: {0}")]
    ChannelNotFound(Snowflake),

    #[error("User not found: {0}")]
    UserNotFound(Snowflake),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Unknown channel kind: {0}")]
    UnknownChannelKind(i32),

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(u8),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::GuildNotFound(_) => "UNKNOWN_GUILD",
            Self::ChannelNotFound(_) => "UNKNOWN_CHANNEL",
            Self::UserNotFound(_) => "UNKNOWN_USER",
            Self::UnknownChannelKind(_) => "UNKNOWN_CHANNEL_KIND",
            Self::UnknownMessageKind(_) => "UNKNOWN_MESSAGE_KIND",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::GuildNotFound(_) | Self::ChannelNotFound(_) | Self::UserNotFound(_)
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownChannelKind(_)
                | Self::UnknownMessageKind(_)
                | Self::MissingField(_)
                | Self::ValidationError(_)
        )
    }
}
