//! # kook-cache
//!
//! Concurrency-safe local mirror of the entities a session observes.
//!
//! ## Modules
//!
//! - `users`: global user registry with explicit counted handles
//! - `messages`: capacity-bounded, timestamp-ordered message windows
//! - `stores`: the [`EntityCache`] tying guilds, channels, members and windows together

pub mod error;
pub mod messages;
pub mod stores;
pub mod users;

pub use error::{CacheError, CacheResult};
pub use messages::MessageWindow;
pub use stores::{CacheStats, EntityCache, GuildUser};
pub use users::{GlobalUserHandle, GlobalUserRegistry, GuildUserRecord};
