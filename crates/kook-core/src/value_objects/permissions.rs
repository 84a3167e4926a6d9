//! Permission bitflags for guild roles and channel overwrites
//!
//! Bit positions follow the service's permission table. Values travel as
//! strings or numbers depending on the endpoint, so both are accepted.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

bitflags! {
    /// Guild permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        /// Bypass all permission checks
        const ADMINISTRATOR      = 1 << 0;
        const MANAGE_GUILD       = 1 << 1;
        const VIEW_AUDIT_LOG     = 1 << 2;
        const CREATE_INVITES     = 1 << 3;
        const MANAGE_INVITES     = 1 << 4;
        const MANAGE_CHANNELS    = 1 << 5;
        const KICK_MEMBERS       = 1 << 6;
        const BAN_MEMBERS        = 1 << 7;
        const MANAGE_EMOJIS      = 1 << 8;
        const CHANGE_NICKNAME    = 1 << 9;
        const MANAGE_ROLES       = 1 << 10;
        /// View channel and read messages
        const VIEW_CHANNEL       = 1 << 11;
        const SEND_MESSAGES      = 1 << 12;
        const MANAGE_MESSAGES    = 1 << 13;
        const ATTACH_FILES       = 1 << 14;
        /// Join voice channels
        const CONNECT            = 1 << 15;
        const MANAGE_VOICE       = 1 << 16;
        const MENTION_EVERYONE   = 1 << 17;
        const ADD_REACTIONS      = 1 << 18;
        const FOLLOW_REACTIONS   = 1 << 19;
        const PASSIVE_CONNECT    = 1 << 20;
        const ONLY_PUSH_TO_TALK  = 1 << 21;
        const USE_VOICE_ACTIVITY = 1 << 22;
        const SPEAK              = 1 << 23;
        const DEAFEN_MEMBERS     = 1 << 24;
        const MUTE_MEMBERS       = 1 << 25;
        const MANAGE_NICKNAMES   = 1 << 26;
        const PLAY_SOUNDTRACK    = 1 << 27;
        const SHARE_SCREEN       = 1 << 28;

        /// Everything a plain text-channel member usually holds
        const TEXT = Self::VIEW_CHANNEL.bits()
            | Self::SEND_MESSAGES.bits()
            | Self::ATTACH_FILES.bits()
            | Self::ADD_REACTIONS.bits()
            | Self::FOLLOW_REACTIONS.bits();

        /// Everything a plain voice-channel member usually holds
        const VOICE = Self::VIEW_CHANNEL.bits()
            | Self::CONNECT.bits()
            | Self::SPEAK.bits()
            | Self::USE_VOICE_ACTIVITY.bits();
    }
}

impl Permissions {
    /// `ADMINISTRATOR` implies every bit
    #[inline]
    pub fn has(&self, permission: Permissions) -> bool {
        self.contains(Permissions::ADMINISTRATOR) || self.contains(permission)
    }

    #[inline]
    pub fn has_any(&self, permissions: Permissions) -> bool {
        self.contains(Permissions::ADMINISTRATOR) || self.intersects(permissions)
    }

    /// Union of the permissions granted by each role
    pub fn from_roles<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Permissions>,
    {
        roles.into_iter().collect()
    }

    /// Apply a channel overwrite: denied bits are cleared, then allowed bits set
    #[must_use]
    pub fn apply_overwrite(self, allow: Permissions, deny: Permissions) -> Self {
        (self & !deny) | allow
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::empty()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl FromStr for Permissions {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Permissions::from_bits_truncate)
    }
}

impl From<u64> for Permissions {
    fn from(bits: u64) -> Self {
        Permissions::from_bits_truncate(bits)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

/// Wire shapes seen for permission values
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPermissions {
    Bits(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawPermissions::deserialize(deserializer)? {
            RawPermissions::Bits(bits) => Ok(bits.into()),
            RawPermissions::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
