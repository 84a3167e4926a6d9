//! Dispatch event names

use std::fmt;

/// Event types this client understands; anything else passes through as raw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    Ready,
    Resumed,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    UserUpdate,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
}

const NAMES: &[(GatewayEventType, &str)] = &[
    (GatewayEventType::Ready, "READY"),
    (GatewayEventType::Resumed, "RESUMED"),
    (GatewayEventType::GuildCreate, "GUILD_CREATE"),
    (GatewayEventType::GuildUpdate, "GUILD_UPDATE"),
    (GatewayEventType::GuildDelete, "GUILD_DELETE"),
    (GatewayEventType::ChannelCreate, "CHANNEL_CREATE"),
    (GatewayEventType::ChannelUpdate, "CHANNEL_UPDATE"),
    (GatewayEventType::ChannelDelete, "CHANNEL_DELETE"),
    (GatewayEventType::GuildMemberAdd, "GUILD_MEMBER_ADD"),
    (GatewayEventType::GuildMemberUpdate, "GUILD_MEMBER_UPDATE"),
    (GatewayEventType::GuildMemberRemove, "GUILD_MEMBER_REMOVE"),
    (GatewayEventType::UserUpdate, "USER_UPDATE"),
    (GatewayEventType::MessageCreate, "MESSAGE_CREATE"),
    (GatewayEventType::MessageUpdate, "MESSAGE_UPDATE"),
    (GatewayEventType::MessageDelete, "MESSAGE_DELETE"),
];

impl GatewayEventType {
    pub fn parse(name: &str) -> Option<Self> {
        NAMES.iter().find(|(_, n)| *n == name).map(|(t, _)| *t)
    }

    pub fn as_str(self) -> &'static str {
        NAMES
            .iter()
            .find(|(t, _)| *t == self)
            .map_or("UNKNOWN", |(_, n)| n)
    }

    /// Whether the event mutates the entity cache before it is published
    pub fn mutates_cache(self) -> bool {
        !matches!(self, Self::Resumed)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
