//! Entity records mirrored by the client cache

mod channel;
mod guild;
mod member;
mod message;
mod user;

pub use channel::{
    CategoryChannel, Channel, ChannelKind, DirectChannel, HasPermissionOverwrites,
    MessageChannel, NestedChannel, OverwriteTarget, PermissionOverwrite, TextChannel,
    VoiceChannel,
};
pub use guild::Guild;
pub use member::GuildMember;
pub use message::{Message, MessageKind};
pub use user::User;
