//! Capacity-bounded message window
//!
//! Messages are keyed by id and indexed by `(timestamp, id)`. When an insert
//! pushes the window past its capacity, the entry with the lowest timestamp
//! is evicted.
//!
//! Queries share a read lock and never wait on each other; inserts, edits and
//! removals take the write lock, so every query sees a whole update or none.

use chrono::{DateTime, Utc};
use kook_core::{Direction, Message, MessageId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::error::{CacheError, CacheResult};

type OrderKey = (DateTime<Utc>, MessageId);

#[derive(Debug, Default)]
struct WindowInner {
    by_id: HashMap<MessageId, Message>,
    order: BTreeSet<OrderKey>,
}

impl WindowInner {
    fn collect<'a>(&self, keys: impl Iterator<Item = &'a OrderKey>, limit: usize) -> Vec<Message> {
        keys.take(limit)
            .filter_map(|(_, id)| self.by_id.get(id).cloned())
            .collect()
    }
}

/// Bounded, timestamp-ordered cache of recent messages for one channel
#[derive(Debug)]
pub struct MessageWindow {
    capacity: usize,
    inner: RwLock<WindowInner>,
}

impl MessageWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(WindowInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Insert (or replace) a message; returns the entry evicted to stay within capacity
    pub fn add(&self, message: Message) -> Option<Message> {
        let mut inner = self.inner.write();

        if let Some(previous) = inner.by_id.remove(&message.id) {
            inner.order.remove(&(previous.timestamp, previous.id));
        }
        inner.order.insert((message.timestamp, message.id));
        inner.by_id.insert(message.id, message);

        if inner.by_id.len() <= self.capacity {
            return None;
        }
        let (_, oldest) = inner.order.pop_first()?;
        inner.by_id.remove(&oldest)
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.inner.read().by_id.get(&id).cloned()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.inner.read().by_id.contains_key(&id)
    }

    pub fn remove(&self, id: MessageId) -> Option<Message> {
        let mut inner = self.inner.write();
        let removed = inner.by_id.remove(&id)?;
        inner.order.remove(&(removed.timestamp, removed.id));
        Some(removed)
    }

    /// Apply an edit in place; returns `(before, after)` if the message is cached
    pub fn edit(
        &self,
        id: MessageId,
        content: String,
        edited_at: DateTime<Utc>,
    ) -> Option<(Message, Message)> {
        let mut inner = self.inner.write();
        let message = inner.by_id.get_mut(&id)?;
        let before = message.clone();
        message.edit(content, edited_at);
        Some((before, message.clone()))
    }

    /// Messages relative to `anchor`.
    ///
    /// - `Before`: strictly earlier than the anchor, nearest first
    /// - `After`: strictly later than the anchor, nearest first
    /// - `Around`: up to `limit / 2` on each side plus the anchor, chronological
    ///
    /// Without an anchor the most recent `limit` messages are returned in
    /// chronological order. An anchor that is not cached yields nothing.
    pub fn get_range(
        &self,
        anchor: Option<MessageId>,
        direction: Direction,
        limit: i64,
    ) -> CacheResult<Vec<Message>> {
        if limit < 0 {
            return Err(CacheError::InvalidLimit(limit));
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        let Some(anchor) = anchor else {
            let mut latest = inner.collect(inner.order.iter().rev(), limit);
            latest.reverse();
            return Ok(latest);
        };
        let Some(anchor_msg) = inner.by_id.get(&anchor) else {
            return Ok(Vec::new());
        };
        let key = (anchor_msg.timestamp, anchor_msg.id);
        let earlier = || inner.order.range(..key).rev().filter(|(ts, _)| *ts < key.0);
        let later = || inner.order.range(key..).skip(1).filter(|(ts, _)| *ts > key.0);

        let result = match direction {
            Direction::Before => inner.collect(earlier(), limit),
            Direction::After => inner.collect(later(), limit),
            Direction::Around => {
                let half = limit / 2;
                let mut around = inner.collect(earlier(), half);
                around.reverse();
                around.push(anchor_msg.clone());
                around.extend(inner.collect(later(), half));
                around
            }
        };
        Ok(result)
    }

    /// All cached messages, oldest first
    pub fn all(&self) -> Vec<Message> {
        let inner = self.inner.read();
        inner.collect(inner.order.iter(), usize::MAX)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.order.clear();
    }
}
