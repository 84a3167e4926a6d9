//! Guild entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Guild (server) record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(rename = "user_id")]
    pub owner_id: Snowflake,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub default_channel_id: Option<Snowflake>,
}

impl Guild {
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            icon: None,
            topic: None,
            default_channel_id: None,
        }
    }

    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }
}
