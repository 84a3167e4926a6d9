//! Gateway wire protocol: opcodes, frame envelope, close codes, payloads, codecs

mod close_codes;
mod codec;
mod frame;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseCode};
pub use codec::{FrameCodec, JsonCodec, KookCodec, KOOK_MESSAGE_EVENT, KOOK_PING_INTERVAL};
pub use frame::{GatewayFrame, ServerFrame};
pub use opcodes::OpCode;
pub use payloads::{
    ConnectionProperties, HelloPayload, IdentifyPayload, PresenceStatus, PresenceUpdatePayload,
    ResumePayload,
};
