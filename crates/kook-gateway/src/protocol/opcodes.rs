//! Gateway operation codes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Operation code carried by every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OpCode {
    /// Event delivery, the only sequenced opcode
    Dispatch = 0,
    /// Liveness ping; the service may also ask for one
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    Resume = 4,
    /// Service asks the client to reconnect
    Reconnect = 5,
    InvalidSession = 7,
    /// First frame on a new connection
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Opcodes this client writes
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(
            self,
            Self::Heartbeat | Self::Identify | Self::PresenceUpdate | Self::Resume
        )
    }

    /// Opcodes the service writes
    #[must_use]
    pub const fn is_inbound(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "DISPATCH",
            Self::Heartbeat => "HEARTBEAT",
            Self::Identify => "IDENTIFY",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::Resume => "RESUME",
            Self::Reconnect => "RECONNECT",
            Self::InvalidSession => "INVALID_SESSION",
            Self::Hello => "HELLO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::Resume,
            5 => Self::Reconnect,
            7 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op.as_u8()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}
