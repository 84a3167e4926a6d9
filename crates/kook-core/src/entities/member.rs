//! Guild member - guild-local attributes of a user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Guild-scoped attributes of a user. Identity lives in [`crate::User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default, rename = "roles")]
    pub role_ids: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl GuildMember {
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nickname: None,
            role_ids: Vec::new(),
            joined_at: None,
        }
    }

    /// Nickname if set, otherwise the given fallback (usually the username)
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.nickname.as_deref().unwrap_or(fallback)
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.role_ids.contains(&role_id)
    }
}
