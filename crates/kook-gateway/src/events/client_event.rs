//! Events delivered to subscribers

use kook_cache::GuildUser;
use kook_core::{Channel, Guild, GuildMember, Message, MessageId, Snowflake, User};
use kook_rest::RateLimitInfo;
use serde_json::Value;
use std::sync::Arc;

use super::MessageUpdatePayload;
use crate::connection::ConnectionState;

/// Typed event as seen by the application. Cache-backed variants are
/// published only after the cache reflects them.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Ready {
        session_id: String,
        user_id: Snowflake,
    },
    Resumed,
    /// Every cached entity was dropped ahead of a fresh session
    CacheReset,

    GuildCreated(Guild),
    GuildUpdated {
        before: Option<Guild>,
        after: Guild,
    },
    GuildDeleted {
        guild_id: Snowflake,
        cached: Option<Guild>,
    },

    ChannelCreated(Channel),
    ChannelUpdated {
        before: Option<Channel>,
        after: Channel,
    },
    ChannelDeleted {
        channel_id: Snowflake,
        cached: Option<Channel>,
    },

    MemberJoined(GuildUser),
    MemberUpdated {
        before: Option<GuildMember>,
        after: GuildUser,
    },
    MemberLeft {
        guild_id: Snowflake,
        user: User,
        cached: Option<GuildMember>,
    },
    UserUpdated {
        before: Option<Arc<User>>,
        after: User,
    },

    MessageReceived(Message),
    /// `before`/`after` are present when the message was cached
    MessageUpdated {
        update: MessageUpdatePayload,
        before: Option<Message>,
        after: Option<Message>,
    },
    MessageDeleted {
        channel_id: Snowflake,
        id: MessageId,
        cached: Option<Message>,
    },

    RateLimited(RateLimitInfo),
    FatalError(String),
    Raw {
        event_type: String,
        data: Value,
    },
}

impl ClientEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Ready { .. } => "ready",
            Self::Resumed => "resumed",
            Self::CacheReset => "cache_reset",
            Self::GuildCreated(_) => "guild_created",
            Self::GuildUpdated { .. } => "guild_updated",
            Self::GuildDeleted { .. } => "guild_deleted",
            Self::ChannelCreated(_) => "channel_created",
            Self::ChannelUpdated { .. } => "channel_updated",
            Self::ChannelDeleted { .. } => "channel_deleted",
            Self::MemberJoined(_) => "member_joined",
            Self::MemberUpdated { .. } => "member_updated",
            Self::MemberLeft { .. } => "member_left",
            Self::UserUpdated { .. } => "user_updated",
            Self::MessageReceived(_) => "message_received",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::RateLimited(_) => "rate_limited",
            Self::FatalError(_) => "fatal_error",
            Self::Raw { .. } => "raw",
        }
    }
}
