//! # kook-core
//!
//! Domain layer containing the entity records observed by a client session,
//! identifier value objects, and the small set of capability traits shared by
//! channel kinds. This crate has no knowledge of transports or caches.

pub mod entities;
pub mod error;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    CategoryChannel, Channel, ChannelKind, DirectChannel, Guild, GuildMember,
    HasPermissionOverwrites, Message, MessageChannel, MessageKind, NestedChannel, OverwriteTarget,
    PermissionOverwrite, TextChannel, User, VoiceChannel,
};
pub use error::DomainError;
pub use value_objects::{
    Direction, MessageId, Permissions, RetryMode, Snowflake, SnowflakeParseError, TokenType,
};
