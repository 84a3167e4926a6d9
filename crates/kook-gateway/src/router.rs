//! Event router
//!
//! Applies the cache mutation an event implies, then publishes the typed
//! event. Subscribers therefore always see a cache at least as new as the
//! event they receive.

use kook_cache::{EntityCache, GuildUser};
use kook_core::Snowflake;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::events::{ClientEvent, DispatchEvent, GuildPayload, MemberPayload};

#[derive(Debug, Clone)]
pub struct EventRouter {
    cache: Arc<EntityCache>,
    bus: Arc<EventBus>,
}

impl EventRouter {
    pub fn new(cache: Arc<EntityCache>, bus: Arc<EventBus>) -> Self {
        Self { cache, bus }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Mutate, then publish. Returns the published event.
    pub fn route(&self, event: DispatchEvent) -> ClientEvent {
        let published = self.apply(event);
        self.bus.publish(published.clone());
        published
    }

    pub fn publish(&self, event: ClientEvent) {
        self.bus.publish(event);
    }

    fn apply(&self, event: DispatchEvent) -> ClientEvent {
        let cache = &self.cache;
        match event {
            DispatchEvent::Ready(ready) => {
                cache.set_current_user(&ready.user);
                for guild in ready.guilds {
                    self.load_guild(guild);
                }
                ClientEvent::Ready {
                    session_id: ready.session_id,
                    user_id: ready.user.id,
                }
            }
            DispatchEvent::Resumed => ClientEvent::Resumed,

            DispatchEvent::GuildCreate(payload) => ClientEvent::GuildCreated(self.load_guild(payload)),
            DispatchEvent::GuildUpdate(guild) => ClientEvent::GuildUpdated {
                before: cache.upsert_guild(guild.clone()),
                after: guild,
            },
            DispatchEvent::GuildDelete(payload) => ClientEvent::GuildDeleted {
                guild_id: payload.id,
                cached: cache.remove_guild(payload.id),
            },

            DispatchEvent::ChannelCreate(channel) => {
                cache.upsert_channel(channel.clone());
                ClientEvent::ChannelCreated(channel)
            }
            DispatchEvent::ChannelUpdate(channel) => ClientEvent::ChannelUpdated {
                before: cache.upsert_channel(channel.clone()),
                after: channel,
            },
            DispatchEvent::ChannelDelete(payload) => ClientEvent::ChannelDeleted {
                channel_id: payload.id,
                cached: cache.remove_channel(payload.id),
            },

            DispatchEvent::MemberAdd { guild_id, member } => {
                let (_, view) = self.upsert_member(guild_id, member);
                ClientEvent::MemberJoined(view)
            }
            DispatchEvent::MemberUpdate { guild_id, member } => {
                let (before, after) = self.upsert_member(guild_id, member);
                ClientEvent::MemberUpdated { before, after }
            }
            DispatchEvent::MemberRemove(payload) => ClientEvent::MemberLeft {
                guild_id: payload.guild_id,
                cached: cache.remove_member(payload.guild_id, payload.user.id),
                user: payload.user,
            },
            DispatchEvent::UserUpdate(user) => ClientEvent::UserUpdated {
                before: cache.update_user(user.clone()),
                after: user,
            },

            DispatchEvent::MessageCreate(message) => {
                cache.add_message(message.clone());
                ClientEvent::MessageReceived(message)
            }
            DispatchEvent::MessageUpdate(update) => {
                let edit = cache.edit_message(
                    update.channel_id,
                    update.id,
                    update.content.clone(),
                    update.updated_at,
                );
                let (before, after) = edit.map_or((None, None), |(b, a)| (Some(b), Some(a)));
                ClientEvent::MessageUpdated {
                    update,
                    before,
                    after,
                }
            }
            DispatchEvent::MessageDelete(payload) => ClientEvent::MessageDeleted {
                channel_id: payload.channel_id,
                id: payload.id,
                cached: cache.remove_message(payload.channel_id, payload.id),
            },

            DispatchEvent::Unknown { event_type, data } => ClientEvent::Raw { event_type, data },
        }
    }

    fn load_guild(&self, payload: GuildPayload) -> kook_core::Guild {
        let GuildPayload {
            guild,
            channels,
            members,
        } = payload;
        let guild_id = guild.id;
        self.cache.upsert_guild(guild.clone());
        for channel in channels {
            self.cache.upsert_channel(channel);
        }
        for member in members {
            self.upsert_member(guild_id, member);
        }
        tracing::debug!(guild_id = %guild_id, "Guild loaded into cache");
        guild
    }

    /// Returns the previous member data and the current view
    fn upsert_member(
        &self,
        guild_id: Snowflake,
        payload: MemberPayload,
    ) -> (Option<kook_core::GuildMember>, GuildUser) {
        let (member, user) = payload.into_parts(guild_id);
        let user_id = user.id;

        match self.cache.upsert_member(member.clone(), user.clone()) {
            Ok(before) => {
                let view = self
                    .cache
                    .member(guild_id, user_id)
                    .unwrap_or_else(|| GuildUser {
                        member,
                        user: Arc::new(user),
                    });
                (before, view)
            }
            Err(err) => {
                tracing::warn!(guild_id = %guild_id, user_id = %user_id, error = %err, "Member event for uncached guild");
                (
                    None,
                    GuildUser {
                        member,
                        user: Arc::new(user),
                    },
                )
            }
        }
    }
}
