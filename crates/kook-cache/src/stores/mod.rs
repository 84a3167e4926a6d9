//! Entity stores

mod entity_cache;
mod guild_entry;

pub use entity_cache::{CacheStats, EntityCache, GuildUser};
