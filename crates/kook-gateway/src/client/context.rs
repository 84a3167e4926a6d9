//! Shared client context
//!
//! One explicit object holding the configuration and the shared components.
//! Every component receives it (or the parts it needs) at construction.

use kook_cache::EntityCache;
use kook_common::{ClientConfig, ClientResult};
use kook_rest::{HttpTransport, QueueSettings, RequestQueue, RestTransport};
use std::sync::Arc;

use crate::bus::EventBus;
use crate::events::ClientEvent;

#[derive(Clone)]
pub struct ClientContext {
    config: Arc<ClientConfig>,
    cache: Arc<EntityCache>,
    rest: RequestQueue,
    bus: Arc<EventBus>,
}

impl ClientContext {
    /// Build the shared components over any REST transport.
    ///
    /// Throttling signals seen by the dispatcher are published as
    /// [`ClientEvent::RateLimited`].
    pub fn new(config: ClientConfig, transport: Arc<dyn RestTransport>) -> Self {
        let cache = EntityCache::new_shared(config.cache.message_cache_size);
        let bus = Arc::new(EventBus::new(config.cache.event_buffer));
        let rest = RequestQueue::new(transport, QueueSettings::from_config(&config));

        let rate_limit_bus = Arc::clone(&bus);
        rest.on_rate_limit(move |info| {
            rate_limit_bus.publish(ClientEvent::RateLimited(info.clone()));
        });

        Self {
            config: Arc::new(config),
            cache,
            rest,
            bus,
        }
    }

    /// Build the shared components over HTTP
    pub fn from_config(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(&config.auth, &config.rest)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn rest(&self) -> &RequestQueue {
        &self.rest
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .field("bus", &self.bus)
            .finish()
    }
}
