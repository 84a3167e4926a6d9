//! Dispatch payloads, decoded once by event type

use chrono::{DateTime, Utc};
use kook_core::{Channel, Guild, GuildMember, Message, MessageId, Snowflake, User};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GatewayEventType;
use crate::error::ProtocolError;

/// `READY`: the session is established
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// Resume token for this session generation
    pub session_id: String,
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<GuildPayload>,
}

/// A guild together with the channels and members delivered alongside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildPayload {
    #[serde(flatten)]
    pub guild: Guild,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
}

/// Member as delivered by the service: guild-local attributes plus identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub user: User,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl MemberPayload {
    /// Split into cache records; `guild_id` fills in when the payload omits it
    pub fn into_parts(self, guild_id: Snowflake) -> (GuildMember, User) {
        let member = GuildMember {
            guild_id: self.guild_id.unwrap_or(guild_id),
            user_id: self.user.id,
            nickname: self.nickname,
            role_ids: self.roles,
            joined_at: self.joined_at,
        };
        (member, self.user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildDeletePayload {
    pub id: Snowflake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDeletePayload {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRemovePayload {
    pub guild_id: Snowflake,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdatePayload {
    #[serde(rename = "msg_id")]
    pub id: MessageId,
    #[serde(rename = "target_id")]
    pub channel_id: Snowflake,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeletePayload {
    #[serde(rename = "msg_id")]
    pub id: MessageId,
    #[serde(rename = "target_id")]
    pub channel_id: Snowflake,
}

/// Closed set of dispatch events
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Ready(ReadyPayload),
    Resumed,
    GuildCreate(GuildPayload),
    GuildUpdate(Guild),
    GuildDelete(GuildDeletePayload),
    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    ChannelDelete(ChannelDeletePayload),
    MemberAdd {
        guild_id: Snowflake,
        member: MemberPayload,
    },
    MemberUpdate {
        guild_id: Snowflake,
        member: MemberPayload,
    },
    MemberRemove(MemberRemovePayload),
    UserUpdate(User),
    MessageCreate(Message),
    MessageUpdate(MessageUpdatePayload),
    MessageDelete(MessageDeletePayload),
    /// Event type this client does not model
    Unknown { event_type: String, data: Value },
}

fn parse<T: DeserializeOwned>(event_type: GatewayEventType, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::invalid_payload(event_type.as_str(), e))
}

fn parse_member(data: Value) -> Result<(Snowflake, MemberPayload), ProtocolError> {
    let member: MemberPayload = parse(GatewayEventType::GuildMemberAdd, data)?;
    let guild_id = member
        .guild_id
        .ok_or_else(|| ProtocolError::invalid_payload("GUILD_MEMBER", "missing guild_id"))?;
    Ok((guild_id, member))
}

impl DispatchEvent {
    pub fn decode(event_type: &str, data: Value) -> Result<Self, ProtocolError> {
        let Some(kind) = GatewayEventType::parse(event_type) else {
            return Ok(Self::Unknown {
                event_type: event_type.to_string(),
                data,
            });
        };

        let event = match kind {
            GatewayEventType::Ready => Self::Ready(parse(kind, data)?),
            GatewayEventType::Resumed => Self::Resumed,
            GatewayEventType::GuildCreate => Self::GuildCreate(parse(kind, data)?),
            GatewayEventType::GuildUpdate => Self::GuildUpdate(parse(kind, data)?),
            GatewayEventType::GuildDelete => Self::GuildDelete(parse(kind, data)?),
            GatewayEventType::ChannelCreate => Self::ChannelCreate(parse(kind, data)?),
            GatewayEventType::ChannelUpdate => Self::ChannelUpdate(parse(kind, data)?),
            GatewayEventType::ChannelDelete => Self::ChannelDelete(parse(kind, data)?),
            GatewayEventType::GuildMemberAdd => {
                let (guild_id, member) = parse_member(data)?;
                Self::MemberAdd { guild_id, member }
            }
            GatewayEventType::GuildMemberUpdate => {
                let (guild_id, member) = parse_member(data)?;
                Self::MemberUpdate { guild_id, member }
            }
            GatewayEventType::GuildMemberRemove => Self::MemberRemove(parse(kind, data)?),
            GatewayEventType::UserUpdate => Self::UserUpdate(parse(kind, data)?),
            GatewayEventType::MessageCreate => Self::MessageCreate(parse(kind, data)?),
            GatewayEventType::MessageUpdate => Self::MessageUpdate(parse(kind, data)?),
            GatewayEventType::MessageDelete => Self::MessageDelete(parse(kind, data)?),
        };
        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        let kind = match self {
            Self::Unknown { event_type, .. } => return event_type,
            Self::Ready(_) => GatewayEventType::Ready,
            Self::Resumed => GatewayEventType::Resumed,
            Self::GuildCreate(_) => GatewayEventType::GuildCreate,
            Self::GuildUpdate(_) => GatewayEventType::GuildUpdate,
            Self::GuildDelete(_) => GatewayEventType::GuildDelete,
            Self::ChannelCreate(_) => GatewayEventType::ChannelCreate,
            Self::ChannelUpdate(_) => GatewayEventType::ChannelUpdate,
            Self::ChannelDelete(_) => GatewayEventType::ChannelDelete,
            Self::MemberAdd { .. } => GatewayEventType::GuildMemberAdd,
            Self::MemberUpdate { .. } => GatewayEventType::GuildMemberUpdate,
            Self::MemberRemove(_) => GatewayEventType::GuildMemberRemove,
            Self::UserUpdate(_) => GatewayEventType::UserUpdate,
            Self::MessageCreate(_) => GatewayEventType::MessageCreate,
            Self::MessageUpdate(_) => GatewayEventType::MessageUpdate,
            Self::MessageDelete(_) => GatewayEventType::MessageDelete,
        };
        kind.as_str()
    }
}
