//! Message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{MessageId, Snowflake};

/// Message content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum MessageKind {
    #[default]
    Text = 1,
    Image = 2,
    Video = 3,
    File = 4,
    Audio = 8,
    KMarkdown = 9,
    Card = 10,
    System = 255,
}

impl TryFrom<u8> for MessageKind {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Text),
            2 => Ok(Self::Image),
            3 => Ok(Self::Video),
            4 => Ok(Self::File),
            8 => Ok(Self::Audio),
            9 => Ok(Self::KMarkdown),
            10 => Ok(Self::Card),
            255 => Ok(Self::System),
            other => Err(DomainError::UnknownMessageKind(other)),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind as u8
    }
}

/// Message record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "msg_id")]
    pub id: MessageId,
    #[serde(rename = "target_id")]
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author_id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "msg_timestamp", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(
        default,
        rename = "updated_at",
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "quote", skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<MessageId>,
}

impl Message {
    /// Create a new text message
    pub fn new(
        id: MessageId,
        channel_id: Snowflake,
        author_id: Snowflake,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author_id,
            kind: MessageKind::Text,
            content: content.into(),
            timestamp,
            edited_at: None,
            quote_id: None,
        }
    }

    /// Check if message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Check if message quotes another message
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.quote_id.is_some()
    }

    /// Replace the content and stamp the edit time
    pub fn edit(&mut self, content: impl Into<String>, at: DateTime<Utc>) {
        self.content = content.into();
        self.edited_at = Some(at);
    }

    /// Get a truncated preview of the message (for logs)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}
