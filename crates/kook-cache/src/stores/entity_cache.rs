//! Entity cache
//!
//! Mutators are idempotent on repeated identical input. Readers get clones
//! or shared snapshots, never guards into the stores.
//!
//! Lock order is always guild entry, then member store, then user registry.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kook_core::{Channel, Direction, Guild, GuildMember, Message, MessageId, Snowflake, User};
use parking_lot::RwLock;
use std::sync::Arc;

use super::guild_entry::GuildEntry;
use crate::error::{CacheError, CacheResult};
use crate::messages::MessageWindow;
use crate::users::{GlobalUserHandle, GlobalUserRegistry, GuildUserRecord};

/// Member data joined with the shared user identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildUser {
    pub member: GuildMember,
    pub user: Arc<User>,
}

/// Entry counts across the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub channels: usize,
    pub users: usize,
    pub members: usize,
    pub messages: usize,
}

/// Local mirror of guilds, channels, users and recent messages
#[derive(Debug)]
pub struct EntityCache {
    guilds: DashMap<Snowflake, GuildEntry>,
    channels: DashMap<Snowflake, Channel>,
    users: GlobalUserRegistry,
    windows: DashMap<Snowflake, Arc<MessageWindow>>,
    current_user: RwLock<Option<GlobalUserHandle>>,
    message_cache_size: usize,
}

impl EntityCache {
    /// `message_cache_size` messages are kept per channel; 0 disables message caching
    pub fn new(message_cache_size: usize) -> Self {
        Self {
            guilds: DashMap::new(),
            channels: DashMap::new(),
            users: GlobalUserRegistry::new(),
            windows: DashMap::new(),
            current_user: RwLock::new(None),
            message_cache_size,
        }
    }

    pub fn new_shared(message_cache_size: usize) -> Arc<Self> {
        Arc::new(Self::new(message_cache_size))
    }

    pub fn message_cache_size(&self) -> usize {
        self.message_cache_size
    }

    // =========================================================================
    // Guilds
    // =========================================================================

    /// Insert or replace a guild; returns the previous record
    pub fn upsert_guild(&self, guild: Guild) -> Option<Guild> {
        match self.guilds.entry(guild.id) {
            Entry::Occupied(entry) => {
                Some(std::mem::replace(&mut *entry.get().guild.write(), guild))
            }
            Entry::Vacant(entry) => {
                tracing::trace!(guild_id = %guild.id, "Guild cached");
                entry.insert(GuildEntry::new(guild));
                None
            }
        }
    }

    pub fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds.get(&guild_id).map(|g| g.guild.read().clone())
    }

    pub fn guilds(&self) -> Vec<Guild> {
        self.guilds.iter().map(|g| g.guild.read().clone()).collect()
    }

    /// Remove a guild with its members, channels and message windows.
    ///
    /// Every member gives its user reference back.
    pub fn remove_guild(&self, guild_id: Snowflake) -> Option<Guild> {
        let (_, entry) = self.guilds.remove(&guild_id)?;
        let GuildEntry { guild, members } = entry;

        let mut released = 0usize;
        for (_, record) in members {
            let (_, handle) = record.into_parts();
            self.users.remove_ref(handle);
            released += 1;
        }

        let channel_ids: Vec<Snowflake> = self
            .channels
            .iter()
            .filter(|c| c.guild_id() == Some(guild_id))
            .map(|c| *c.key())
            .collect();
        for channel_id in &channel_ids {
            self.channels.remove(channel_id);
            self.windows.remove(channel_id);
        }

        tracing::debug!(
            guild_id = %guild_id,
            members = released,
            channels = channel_ids.len(),
            "Guild purged from cache"
        );
        Some(guild.into_inner())
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Insert or replace a channel; message-capable channels get a window
    pub fn upsert_channel(&self, channel: Channel) -> Option<Channel> {
        let channel_id = channel.id();
        if channel.is_message_channel() {
            self.window_or_create(channel_id);
        }
        self.channels.insert(channel_id, channel)
    }

    pub fn channel(&self, channel_id: Snowflake) -> Option<Channel> {
        self.channels.get(&channel_id).map(|c| c.value().clone())
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.value().clone()).collect()
    }

    pub fn guild_channels(&self, guild_id: Snowflake) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|c| c.guild_id() == Some(guild_id))
            .map(|c| c.value().clone())
            .collect()
    }

    /// Remove a channel and its message window
    pub fn remove_channel(&self, channel_id: Snowflake) -> Option<Channel> {
        self.windows.remove(&channel_id);
        self.channels.remove(&channel_id).map(|(_, c)| c)
    }

    // =========================================================================
    // Members and users
    // =========================================================================

    /// Insert or update a guild member.
    ///
    /// A new member takes exactly one reference on the user's shared record;
    /// updating an existing member takes none. Returns the previous member data.
    pub fn upsert_member(&self, mut member: GuildMember, user: User) -> CacheResult<Option<GuildMember>> {
        let guild_id = member.guild_id;
        let guild = self
            .guilds
            .get(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        member.user_id = user.id;

        let previous = match guild.members.entry(user.id) {
            Entry::Occupied(mut entry) => {
                let previous = std::mem::replace(&mut entry.get_mut().member, member);
                self.users.update(user);
                Some(previous)
            }
            Entry::Vacant(entry) => {
                let handle = self.users.add_ref(&user);
                entry.insert(GuildUserRecord::new(member, handle));
                None
            }
        };
        Ok(previous)
    }

    /// Remove a member, giving its user reference back
    pub fn remove_member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<GuildMember> {
        let (_, record) = self.guilds.get(&guild_id)?.members.remove(&user_id)?;
        let (member, handle) = record.into_parts();
        self.users.remove_ref(handle);
        Some(member)
    }

    /// Remove every member of a guild matching `predicate`; returns how many left
    pub fn purge_members<F>(&self, guild_id: Snowflake, predicate: F) -> usize
    where
        F: Fn(&GuildMember) -> bool,
    {
        let Some(guild) = self.guilds.get(&guild_id) else {
            return 0;
        };
        let candidates: Vec<Snowflake> = guild
            .members
            .iter()
            .filter(|r| predicate(&r.member))
            .map(|r| *r.key())
            .collect();

        let mut purged = 0;
        for user_id in candidates {
            if let Some((_, record)) = guild
                .members
                .remove_if(&user_id, |_, record| predicate(&record.member))
            {
                let (_, handle) = record.into_parts();
                self.users.remove_ref(handle);
                purged += 1;
            }
        }
        tracing::debug!(guild_id = %guild_id, purged, "Guild members purged");
        purged
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<GuildUser> {
        let guild = self.guilds.get(&guild_id)?;
        let record = guild.members.get(&user_id)?;
        let user = self.users.get(user_id)?;
        Some(GuildUser {
            member: record.member.clone(),
            user,
        })
    }

    pub fn members(&self, guild_id: Snowflake) -> Vec<GuildUser> {
        let Some(guild) = self.guilds.get(&guild_id) else {
            return Vec::new();
        };
        guild
            .members
            .iter()
            .filter_map(|record| {
                self.users.get(*record.key()).map(|user| GuildUser {
                    member: record.member.clone(),
                    user,
                })
            })
            .collect()
    }

    pub fn user(&self, user_id: Snowflake) -> Option<Arc<User>> {
        self.users.get(user_id)
    }

    /// Replace a referenced user's identity; returns the previous snapshot
    pub fn update_user(&self, user: User) -> Option<Arc<User>> {
        self.users.update(user)
    }

    pub fn users(&self) -> &GlobalUserRegistry {
        &self.users
    }

    /// Pin the session's own user for as long as the session is connected
    pub fn set_current_user(&self, user: &User) {
        let handle = self.users.add_ref(user);
        let previous = self.current_user.write().replace(handle);
        if let Some(previous) = previous {
            self.users.remove_ref(previous);
        }
    }

    pub fn current_user(&self) -> Option<Arc<User>> {
        let user_id = self.current_user.read().as_ref().map(GlobalUserHandle::user_id)?;
        self.users.get(user_id)
    }

    pub fn clear_current_user(&self) {
        let previous = self.current_user.write().take();
        if let Some(previous) = previous {
            self.users.remove_ref(previous);
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub fn window(&self, channel_id: Snowflake) -> Option<Arc<MessageWindow>> {
        self.windows.get(&channel_id).map(|w| Arc::clone(&w))
    }

    fn window_or_create(&self, channel_id: Snowflake) -> Option<Arc<MessageWindow>> {
        if self.message_cache_size == 0 {
            return None;
        }
        let size = self.message_cache_size;
        Some(Arc::clone(
            &self
                .windows
                .entry(channel_id)
                .or_insert_with(|| Arc::new(MessageWindow::new(size))),
        ))
    }

    /// Cache a message; returns the message evicted to make room, if any
    pub fn add_message(&self, message: Message) -> Option<Message> {
        let window = self.window_or_create(message.channel_id)?;
        window.add(message)
    }

    pub fn message(&self, channel_id: Snowflake, id: MessageId) -> Option<Message> {
        self.window(channel_id)?.get(id)
    }

    /// Apply an edit to a cached message; returns `(before, after)`
    pub fn edit_message(
        &self,
        channel_id: Snowflake,
        id: MessageId,
        content: String,
        edited_at: chrono::DateTime<chrono::Utc>,
    ) -> Option<(Message, Message)> {
        self.window(channel_id)?.edit(id, content, edited_at)
    }

    pub fn remove_message(&self, channel_id: Snowflake, id: MessageId) -> Option<Message> {
        self.window(channel_id)?.remove(id)
    }

    /// History query over a channel's window
    pub fn messages(
        &self,
        channel_id: Snowflake,
        anchor: Option<MessageId>,
        direction: Direction,
        limit: i64,
    ) -> CacheResult<Vec<Message>> {
        match self.window(channel_id) {
            Some(window) => window.get_range(anchor, direction, limit),
            None if limit < 0 => Err(CacheError::InvalidLimit(limit)),
            None => Ok(Vec::new()),
        }
    }

    // =========================================================================
    // Whole cache
    // =========================================================================

    /// Drop every entity ahead of a full rebuild
    pub fn clear(&self) {
        let pinned = self.current_user.write().take();
        drop(pinned);
        self.guilds.clear();
        self.channels.clear();
        self.windows.clear();
        self.users.clear();
        tracing::info!("Entity cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            guilds: self.guilds.len(),
            channels: self.channels.len(),
            users: self.users.len(),
            members: self.guilds.iter().map(|g| g.members.len()).sum(),
            messages: self.windows.iter().map(|w| w.len()).sum(),
        }
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(100)
    }
}
