//! Service close codes and what the session does about them

use std::fmt;

/// Close codes the service may send when it ends a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
}

/// How the session reacts to a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Reconnect and resume if the session is still resumable
    Reconnect,
    /// Reconnect but start a fresh session generation
    Reidentify,
    /// Stop and report a fatal error
    Stop,
}

impl CloseCode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        let code = match value {
            4000 => Self::UnknownError,
            4001 => Self::UnknownOpcode,
            4002 => Self::DecodeError,
            4003 => Self::NotAuthenticated,
            4004 => Self::AuthenticationFailed,
            4005 => Self::AlreadyAuthenticated,
            4007 => Self::InvalidSequence,
            4008 => Self::RateLimited,
            4009 => Self::SessionTimeout,
            4010 => Self::InvalidShard,
            4011 => Self::ShardingRequired,
            4012 => Self::InvalidApiVersion,
            _ => return None,
        };
        Some(code)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn action(self) -> CloseAction {
        match self {
            Self::UnknownError
            | Self::UnknownOpcode
            | Self::DecodeError
            | Self::AlreadyAuthenticated
            | Self::RateLimited => CloseAction::Reconnect,
            Self::NotAuthenticated | Self::InvalidSequence | Self::SessionTimeout => {
                CloseAction::Reidentify
            }
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion => CloseAction::Stop,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "unknown error",
            Self::UnknownOpcode => "unknown opcode",
            Self::DecodeError => "payload could not be decoded",
            Self::NotAuthenticated => "payload sent before identify",
            Self::AuthenticationFailed => "authentication failed",
            Self::AlreadyAuthenticated => "identify sent twice",
            Self::InvalidSequence => "invalid resume sequence",
            Self::RateLimited => "sending too fast",
            Self::SessionTimeout => "session timed out",
            Self::InvalidShard => "invalid shard",
            Self::ShardingRequired => "sharding required",
            Self::InvalidApiVersion => "invalid API version",
        }
    }
}

impl CloseAction {
    /// Classify a raw close code; codes outside the service range reconnect
    #[must_use]
    pub fn for_code(code: Option<u16>) -> Self {
        code.and_then(CloseCode::from_u16)
            .map_or(Self::Reconnect, CloseCode::action)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.description())
    }
}
