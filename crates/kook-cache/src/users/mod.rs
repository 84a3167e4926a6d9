//! Shared user identities and their guild-scoped views

mod guild_user;
mod registry;

pub use guild_user::GuildUserRecord;
pub use registry::{GlobalUserHandle, GlobalUserRegistry};
