//! Frame envelope and the decoded inbound union

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, ResumePayload};
use crate::error::ProtocolError;

/// Wire envelope: opcode, optional event type, optional sequence, opaque payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: OpCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayFrame {
    fn control(op: OpCode, d: Option<Value>) -> Self {
        Self { op, t: None, s: None, d }
    }

    // === Outbound ===

    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::control(OpCode::Identify, serde_json::to_value(payload).ok())
    }

    pub fn resume(payload: &ResumePayload) -> Self {
        Self::control(OpCode::Resume, serde_json::to_value(payload).ok())
    }

    pub fn presence_update(payload: &PresenceUpdatePayload) -> Self {
        Self::control(OpCode::PresenceUpdate, serde_json::to_value(payload).ok())
    }

    // === Inbound, as the service writes them ===

    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self::control(
            OpCode::Hello,
            Some(serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms })),
        )
    }

    pub fn dispatch(event_type: impl Into<String>, sequence: Option<u64>, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_type.into()),
            s: sequence,
            d: Some(data),
        }
    }

    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, None)
    }

    pub fn reconnect() -> Self {
        Self::control(OpCode::Reconnect, None)
    }

    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }
}

impl fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if let Some(t) = &self.t {
            write!(f, " {t}")?;
        }
        if let Some(s) = self.s {
            write!(f, " s={s}")?;
        }
        Ok(())
    }
}

/// Inbound frame resolved once by opcode
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Hello(HelloPayload),
    /// Dispatch payload is decoded later by event type
    Dispatch {
        event_type: String,
        sequence: Option<u64>,
        data: Value,
    },
    /// Service asks for an immediate heartbeat
    Heartbeat,
    HeartbeatAck,
    Reconnect,
    InvalidSession { resumable: bool },
}

impl TryFrom<GatewayFrame> for ServerFrame {
    type Error = ProtocolError;

    fn try_from(frame: GatewayFrame) -> Result<Self, Self::Error> {
        match frame.op {
            OpCode::Hello => {
                let d = frame.d.ok_or(ProtocolError::MissingPayload(OpCode::Hello))?;
                let hello = serde_json::from_value(d)
                    .map_err(|e| ProtocolError::invalid_payload("HELLO", e))?;
                Ok(Self::Hello(hello))
            }
            OpCode::Dispatch => {
                let event_type = frame
                    .t
                    .ok_or(ProtocolError::MissingPayload(OpCode::Dispatch))?;
                Ok(Self::Dispatch {
                    event_type,
                    sequence: frame.s,
                    data: frame.d.unwrap_or(Value::Null),
                })
            }
            OpCode::Heartbeat => Ok(Self::Heartbeat),
            OpCode::HeartbeatAck => Ok(Self::HeartbeatAck),
            OpCode::Reconnect => Ok(Self::Reconnect),
            OpCode::InvalidSession => Ok(Self::InvalidSession {
                resumable: frame.d.as_ref().and_then(Value::as_bool).unwrap_or(false),
            }),
            op @ (OpCode::Identify | OpCode::PresenceUpdate | OpCode::Resume) => {
                Err(ProtocolError::UnexpectedOpcode(op))
            }
        }
    }
}
