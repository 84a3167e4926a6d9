//! Channel entities - flat records per channel kind plus capability traits
//!
//! Shared behavior is expressed through small traits rather than a base type;
//! [`Channel`] selects the concrete record by [`ChannelKind`].

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{Permissions, Snowflake};

/// Channel kind discriminator as sent by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ChannelKind {
    Category = 0,
    Text = 1,
    Voice = 2,
    Direct = 3,
}

impl ChannelKind {
    #[inline]
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for ChannelKind {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Category),
            1 => Ok(Self::Text),
            2 => Ok(Self::Voice),
            3 => Ok(Self::Direct),
            other => Err(DomainError::UnknownChannelKind(other)),
        }
    }
}

/// Who a permission overwrite applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum OverwriteTarget {
    Role(Snowflake),
    User(Snowflake),
}

/// Channel-level permission adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

/// Channels that carry permission overwrites
pub trait HasPermissionOverwrites {
    fn permission_overwrites(&self) -> &[PermissionOverwrite];

    /// Resolve a member's permissions in this channel.
    ///
    /// Role overwrites are merged first, then the user-specific overwrite is
    /// applied on top.
    fn effective_permissions(
        &self,
        base: Permissions,
        user_id: Snowflake,
        role_ids: &[Snowflake],
    ) -> Permissions {
        if base.contains(Permissions::ADMINISTRATOR) {
            return base;
        }

        let overwrites = self.permission_overwrites();
        let (role_allow, role_deny) = overwrites
            .iter()
            .filter(|o| matches!(o.target, OverwriteTarget::Role(id) if role_ids.contains(&id)))
            .fold((Permissions::empty(), Permissions::empty()), |(a, d), o| {
                (a | o.allow, d | o.deny)
            });

        let mut resolved = base.apply_overwrite(role_allow, role_deny);
        if let Some(user) = overwrites
            .iter()
            .find(|o| o.target == OverwriteTarget::User(user_id))
        {
            resolved = resolved.apply_overwrite(user.allow, user.deny);
        }
        resolved
    }
}

/// Channels that hold a message history
pub trait MessageChannel {
    fn channel_id(&self) -> Snowflake;
    fn guild_id(&self) -> Option<Snowflake>;
}

/// Channels that can sit under a category
pub trait NestedChannel {
    fn parent_id(&self) -> Option<Snowflake>;
    fn position(&self) -> i32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChannel {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub topic: Option<String>,
    pub parent_id: Option<Snowflake>,
    pub position: i32,
    pub slow_mode_secs: u32,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub parent_id: Option<Snowflake>,
    pub position: i32,
    /// 0 means unlimited
    pub user_limit: u32,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChannel {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub position: i32,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectChannel {
    pub id: Snowflake,
    pub recipient_id: Snowflake,
}

impl HasPermissionOverwrites for TextChannel {
    fn permission_overwrites(&self) -> &[PermissionOverwrite] {
        &self.overwrites
    }
}

impl HasPermissionOverwrites for VoiceChannel {
    fn permission_overwrites(&self) -> &[PermissionOverwrite] {
        &self.overwrites
    }
}

impl HasPermissionOverwrites for CategoryChannel {
    fn permission_overwrites(&self) -> &[PermissionOverwrite] {
        &self.overwrites
    }
}

impl MessageChannel for TextChannel {
    fn channel_id(&self) -> Snowflake {
        self.id
    }

    fn guild_id(&self) -> Option<Snowflake> {
        Some(self.guild_id)
    }
}

// Voice channels have an attached text chat.
impl MessageChannel for VoiceChannel {
    fn channel_id(&self) -> Snowflake {
        self.id
    }

    fn guild_id(&self) -> Option<Snowflake> {
        Some(self.guild_id)
    }
}

impl MessageChannel for DirectChannel {
    fn channel_id(&self) -> Snowflake {
        self.id
    }

    fn guild_id(&self) -> Option<Snowflake> {
        None
    }
}

impl NestedChannel for TextChannel {
    fn parent_id(&self) -> Option<Snowflake> {
        self.parent_id
    }

    fn position(&self) -> i32 {
        self.position
    }
}

impl NestedChannel for VoiceChannel {
    fn parent_id(&self) -> Option<Snowflake> {
        self.parent_id
    }

    fn position(&self) -> i32 {
        self.position
    }
}

/// Any channel, selected by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChannel", into = "RawChannel")]
pub enum Channel {
    Text(TextChannel),
    Voice(VoiceChannel),
    Category(CategoryChannel),
    Direct(DirectChannel),
}

impl Channel {
    pub fn id(&self) -> Snowflake {
        match self {
            Self::Text(c) => c.id,
            Self::Voice(c) => c.id,
            Self::Category(c) => c.id,
            Self::Direct(c) => c.id,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Text(_) => ChannelKind::Text,
            Self::Voice(_) => ChannelKind::Voice,
            Self::Category(_) => ChannelKind::Category,
            Self::Direct(_) => ChannelKind::Direct,
        }
    }

    /// Owning guild, `None` for direct channels
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::Text(c) => Some(c.guild_id),
            Self::Voice(c) => Some(c.guild_id),
            Self::Category(c) => Some(c.guild_id),
            Self::Direct(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Text(c) => Some(&c.name),
            Self::Voice(c) => Some(&c.name),
            Self::Category(c) => Some(&c.name),
            Self::Direct(_) => None,
        }
    }

    pub fn as_message_channel(&self) -> Option<&dyn MessageChannel> {
        match self {
            Self::Text(c) => Some(c),
            Self::Voice(c) => Some(c),
            Self::Direct(c) => Some(c),
            Self::Category(_) => None,
        }
    }

    pub fn as_overwrites(&self) -> Option<&dyn HasPermissionOverwrites> {
        match self {
            Self::Text(c) => Some(c),
            Self::Voice(c) => Some(c),
            Self::Category(c) => Some(c),
            Self::Direct(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&dyn NestedChannel> {
        match self {
            Self::Text(c) => Some(c),
            Self::Voice(c) => Some(c),
            Self::Category(_) | Self::Direct(_) => None,
        }
    }

    #[inline]
    pub fn is_message_channel(&self) -> bool {
        self.as_message_channel().is_some()
    }
}

/// Wire form shared by every channel kind
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChannel {
    id: Snowflake,
    #[serde(rename = "type")]
    kind: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<Snowflake>,
    #[serde(default, rename = "level")]
    position: i32,
    #[serde(default, rename = "slow_mode")]
    slow_mode_secs: u32,
    #[serde(default, rename = "limit_amount")]
    user_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recipient_id: Option<Snowflake>,
    #[serde(default, rename = "permission_overwrites")]
    overwrites: Vec<PermissionOverwrite>,
}

impl TryFrom<RawChannel> for Channel {
    type Error = DomainError;

    fn try_from(raw: RawChannel) -> Result<Self, Self::Error> {
        let kind = ChannelKind::try_from(raw.kind)?;
        let guild_id = || raw.guild_id.ok_or(DomainError::MissingField("guild_id"));

        let channel = match kind {
            ChannelKind::Text => Self::Text(TextChannel {
                id: raw.id,
                guild_id: guild_id()?,
                name: raw.name,
                topic: raw.topic,
                parent_id: raw.parent_id,
                position: raw.position,
                slow_mode_secs: raw.slow_mode_secs,
                overwrites: raw.overwrites,
            }),
            ChannelKind::Voice => Self::Voice(VoiceChannel {
                id: raw.id,
                guild_id: guild_id()?,
                name: raw.name,
                parent_id: raw.parent_id,
                position: raw.position,
                user_limit: raw.user_limit,
                overwrites: raw.overwrites,
            }),
            ChannelKind::Category => Self::Category(CategoryChannel {
                id: raw.id,
                guild_id: guild_id()?,
                name: raw.name,
                position: raw.position,
                overwrites: raw.overwrites,
            }),
            ChannelKind::Direct => Self::Direct(DirectChannel {
                id: raw.id,
                recipient_id: raw
                    .recipient_id
                    .ok_or(DomainError::MissingField("recipient_id"))?,
            }),
        };
        Ok(channel)
    }
}

impl From<Channel> for RawChannel {
    fn from(channel: Channel) -> Self {
        let mut raw = RawChannel {
            id: channel.id(),
            kind: channel.kind().as_i32(),
            guild_id: channel.guild_id(),
            name: String::new(),
            topic: None,
            parent_id: None,
            position: 0,
            slow_mode_secs: 0,
            user_limit: 0,
            recipient_id: None,
            overwrites: Vec::new(),
        };
        match channel {
            Channel::Text(c) => {
                raw.name = c.name;
                raw.topic = c.topic;
                raw.parent_id = c.parent_id;
                raw.position = c.position;
                raw.slow_mode_secs = c.slow_mode_secs;
                raw.overwrites = c.overwrites;
            }
            Channel::Voice(c) => {
                raw.name = c.name;
                raw.parent_id = c.parent_id;
                raw.position = c.position;
                raw.user_limit = c.user_limit;
                raw.overwrites = c.overwrites;
            }
            Channel::Category(c) => {
                raw.name = c.name;
                raw.position = c.position;
                raw.overwrites = c.overwrites;
            }
            Channel::Direct(c) => {
                raw.recipient_id = Some(c.recipient_id);
            }
        }
        raw
    }
}
