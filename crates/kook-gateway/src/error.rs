//! Gateway error types

use kook_common::ClientError;
use kook_rest::RestError;
use thiserror::Error;

use crate::protocol::OpCode;

/// A single frame could not be understood; the frame is dropped, the session survives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Decode(String),

    #[error("Unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("Opcode {0} is not expected from the service")]
    UnexpectedOpcode(OpCode),

    #[error("Frame with opcode {0} has no payload")]
    MissingPayload(OpCode),

    #[error("Invalid {event_type} payload: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("Frame could not be encoded: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn invalid_payload(event_type: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            event_type: event_type.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Socket-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Connection closed")]
    Closed,
}

/// Reasons a connection generation ended or the session stopped
#[derive(Debug, Error)]
pub enum GatewayError {
    // Recoverable: the session reconnects
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Heartbeat acknowledgement missed")]
    HeartbeatTimeout,

    #[error("Connection closed by service (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Session invalidated (resumable: {resumable})")]
    InvalidSession { resumable: bool },

    #[error("Service requested reconnect")]
    ReconnectRequested,

    #[error("REST call failed: {0}")]
    Rest(#[from] RestError),

    // Terminal: the session stops
    #[error("Fatal close (code {code}): {reason}")]
    FatalClose { code: u16, reason: String },

    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Session stopped")]
    Stopped,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl GatewayError {
    /// Whether the session must stop instead of reconnecting
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FatalClose { .. } | Self::ReconnectExhausted { .. } | Self::AlreadyStarted | Self::Stopped
        )
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Stopped => Self::SessionStopped,
            GatewayError::Transport(e) => Self::Transport(e.to_string()),
            GatewayError::Rest(e) => e.into(),
            GatewayError::Protocol(e) => Self::Decode(e.to_string()),
            other => Self::Gateway(other.to_string()),
        }
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
