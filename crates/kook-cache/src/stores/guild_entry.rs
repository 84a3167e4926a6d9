//! Per-guild store

use dashmap::DashMap;
use kook_core::{Guild, Snowflake};
use parking_lot::RwLock;

use crate::users::GuildUserRecord;

/// A cached guild and its membership store
#[derive(Debug)]
pub(crate) struct GuildEntry {
    pub(crate) guild: RwLock<Guild>,
    pub(crate) members: DashMap<Snowflake, GuildUserRecord>,
}

impl GuildEntry {
    pub(crate) fn new(guild: Guild) -> Self {
        Self {
            guild: RwLock::new(guild),
            members: DashMap::new(),
        }
    }
}
