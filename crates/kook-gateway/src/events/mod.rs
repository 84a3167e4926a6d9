//! Dispatch event decoding and the subscriber-facing event set

mod client_event;
mod dispatch;
mod event_types;

pub use client_event::ClientEvent;
pub use dispatch::{
    ChannelDeletePayload, DispatchEvent, GuildDeletePayload, GuildPayload, MemberPayload,
    MemberRemovePayload, MessageDeletePayload, MessageUpdatePayload, ReadyPayload,
};
pub use event_types::GatewayEventType;
