//! Frame codecs
//!
//! `KookCodec` speaks the service's signal layout `{s, sn, d}`. `JsonCodec`
//! writes the envelope as is, `{op, t, s, d}`, and is what the scripted
//! services in the test suites speak.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{GatewayFrame, OpCode};
use crate::error::ProtocolError;
use crate::transport::TransportMessage;

/// Turns transport payloads into frames and back
pub trait FrameCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<GatewayFrame, ProtocolError>;

    /// `None` when the frame has no wire form in this layout
    fn encode(&self, frame: &GatewayFrame) -> Result<Option<TransportMessage>, ProtocolError>;

    fn name(&self) -> &'static str;
}

/// JSON text frames
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl FrameCodec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<GatewayFrame, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    fn encode(&self, frame: &GatewayFrame) -> Result<Option<TransportMessage>, ProtocolError> {
        serde_json::to_string(frame)
            .map(|text| Some(TransportMessage::Text(text)))
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Signal numbers of the service layout
mod signal {
    pub const EVENT: u8 = 0;
    pub const HELLO: u8 = 1;
    pub const PING: u8 = 2;
    pub const PONG: u8 = 3;
    pub const RESUME: u8 = 4;
    pub const RECONNECT: u8 = 5;
    pub const RESUME_ACK: u8 = 6;
}

/// Ping period the service expects from clients
pub const KOOK_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Message type of service-generated events
const SYSTEM_MESSAGE_TYPE: u64 = 255;

/// Event name for ordinary chat messages
pub const KOOK_MESSAGE_EVENT: &str = "message";

#[derive(Debug, Serialize, Deserialize)]
struct SignalFrame {
    s: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sn: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<Value>,
}

/// The service's own layout, JSON text with compression disabled.
///
/// Credentials travel in the gateway URL, so `Identify` has no wire form.
/// `HELLO` carries the session id and is decoded into a `Hello` frame that
/// names it. `RECONNECT` always discards the session and decodes into a
/// non-resumable `InvalidSession`. `RESUME_ACK` decodes into a `RESUMED`
/// dispatch.
#[derive(Debug, Clone, Copy)]
pub struct KookCodec {
    ping_interval: Duration,
}

impl KookCodec {
    pub fn new() -> Self {
        Self {
            ping_interval: KOOK_PING_INTERVAL,
        }
    }

    fn hello(&self, data: Option<Value>) -> GatewayFrame {
        let data = data.unwrap_or(Value::Null);
        let code = data.get("code").and_then(Value::as_u64).unwrap_or(0);
        if code != 0 {
            tracing::warn!(code, "Gateway refused the connection");
            return GatewayFrame::invalid_session(false);
        }
        let mut hello = json!({ "heartbeat_interval": self.ping_interval.as_millis() as u64 });
        if let Some(session_id) = data.get("session_id").and_then(Value::as_str) {
            hello["session_id"] = Value::from(session_id);
        }
        GatewayFrame {
            op: OpCode::Hello,
            t: None,
            s: None,
            d: Some(hello),
        }
    }
}

impl Default for KookCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// System events name themselves in `extra.type`
fn event_name(data: &Value) -> &str {
    let system = data.get("type").and_then(Value::as_u64) == Some(SYSTEM_MESSAGE_TYPE);
    system
        .then(|| data.pointer("/extra/type").and_then(Value::as_str))
        .flatten()
        .unwrap_or(KOOK_MESSAGE_EVENT)
}

impl FrameCodec for KookCodec {
    fn decode(&self, bytes: &[u8]) -> Result<GatewayFrame, ProtocolError> {
        let wire: SignalFrame =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;

        match wire.s {
            signal::EVENT => {
                let data = wire.d.unwrap_or(Value::Null);
                let name = event_name(&data).to_string();
                Ok(GatewayFrame::dispatch(name, wire.sn, data))
            }
            signal::HELLO => Ok(self.hello(wire.d)),
            signal::PONG => Ok(GatewayFrame::heartbeat_ack()),
            signal::RECONNECT => Ok(GatewayFrame::invalid_session(false)),
            signal::RESUME_ACK => Ok(GatewayFrame::dispatch(
                "RESUMED",
                None,
                wire.d.unwrap_or(Value::Null),
            )),
            other => Err(ProtocolError::Decode(format!(
                "Signal {other} is not expected from the service"
            ))),
        }
    }

    fn encode(&self, frame: &GatewayFrame) -> Result<Option<TransportMessage>, ProtocolError> {
        let wire = match frame.op {
            OpCode::Heartbeat => SignalFrame {
                s: signal::PING,
                sn: Some(frame.d.as_ref().and_then(Value::as_u64).unwrap_or(0)),
                d: None,
            },
            OpCode::Resume => {
                let seq = frame
                    .d
                    .as_ref()
                    .and_then(|d| d.get("seq"))
                    .and_then(Value::as_u64)
                    .ok_or(ProtocolError::MissingPayload(OpCode::Resume))?;
                SignalFrame {
                    s: signal::RESUME,
                    sn: Some(seq),
                    d: None,
                }
            }
            OpCode::Identify | OpCode::PresenceUpdate => return Ok(None),
            op => return Err(ProtocolError::Encode(format!("{op} has no client signal"))),
        };
        serde_json::to_string(&wire)
            .map(|text| Some(TransportMessage::Text(text)))
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "kook"
    }
}
