//! In-process event bus
//!
//! One bounded queue per subscriber group. Publishing never waits: a full
//! queue drops the event for that group only and counts the drop.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::events::ClientEvent;

#[derive(Debug)]
struct GroupQueue {
    sender: mpsc::Sender<ClientEvent>,
    dropped: AtomicU64,
}

/// Receiving end of one subscriber group
#[derive(Debug)]
pub struct EventSubscription {
    group: String,
    receiver: mpsc::Receiver<ClientEvent>,
}

impl EventSubscription {
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Next event in publish order; `None` once the group is removed
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.receiver.try_recv().ok()
    }
}

pub struct EventBus {
    groups: DashMap<String, Arc<GroupQueue>>,
    buffer: usize,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            groups: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Open a group queue. Subscribing to an existing group replaces its queue.
    pub fn subscribe(&self, group: impl Into<String>) -> EventSubscription {
        let group = group.into();
        let (sender, receiver) = mpsc::channel(self.buffer);
        let queue = Arc::new(GroupQueue {
            sender,
            dropped: AtomicU64::new(0),
        });
        if self.groups.insert(group.clone(), queue).is_some() {
            tracing::debug!(group = %group, "Subscriber group replaced");
        }
        EventSubscription { group, receiver }
    }

    pub fn unsubscribe(&self, group: &str) -> bool {
        self.groups.remove(group).is_some()
    }

    /// Deliver to every group; returns how many groups accepted the event
    pub fn publish(&self, event: ClientEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in &self.groups {
            match entry.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    let dropped = entry.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        group = %entry.key(),
                        event = event.name(),
                        dropped,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(entry.key().clone()),
            }
        }

        for group in closed {
            self.groups
                .remove_if(&group, |_, queue| queue.sender.is_closed());
            tracing::debug!(group = %group, "Subscriber group closed");
        }

        tracing::trace!(event = event.name(), delivered, "Event published");
        delivered
    }

    /// Events dropped for `group` because its queue was full
    pub fn dropped(&self, group: &str) -> u64 {
        self.groups
            .get(group)
            .map_or(0, |queue| queue.dropped.load(Ordering::Relaxed))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("groups", &self.groups.len())
            .field("buffer", &self.buffer)
            .finish()
    }
}
