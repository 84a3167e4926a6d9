//! Session connection states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Identifying,
    Resuming,
    Connected,
    Reconnecting,
    /// Terminal
    Stopped,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{
            Connected, Connecting, Disconnected, Identifying, Reconnecting, Resuming, Stopped,
        };

        if self == Stopped {
            return false;
        }
        if next == Stopped {
            return true;
        }
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Identifying | Resuming | Reconnecting)
                | (Identifying | Resuming, Connected | Reconnecting)
                | (Connected | Reconnecting, Reconnecting)
                | (Reconnecting, Connecting)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }

    /// A handshake is in progress on an open transport
    pub fn is_handshaking(self) -> bool {
        matches!(self, Self::Identifying | Self::Resuming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
