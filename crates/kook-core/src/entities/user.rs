//! User entity - identity shared across every guild the user appears in

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Global user identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    /// Four digit discriminator shown after the username
    #[serde(rename = "identify_num", default)]
    pub identify_number: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub banned: bool,
}

impl User {
    /// Create a new User with required fields
    pub fn new(id: Snowflake, username: impl Into<String>, identify_number: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            identify_number: identify_number.into(),
            avatar: None,
            bot: false,
            online: false,
            banned: false,
        }
    }

    /// Get the full tag: username#identify_number
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.identify_number)
    }

    #[inline]
    pub fn is_bot(&self) -> bool {
        self.bot
    }
}
