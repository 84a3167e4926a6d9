//! Global user registry
//!
//! One shared record per user id, kept alive by a reference count. Every
//! guild-scoped view holds exactly one [`GlobalUserHandle`] and gives it back
//! through [`GlobalUserRegistry::remove_ref`] when it leaves; release never
//! happens implicitly.

use dashmap::DashMap;
use kook_core::{Snowflake, User};
use std::sync::Arc;

/// Proof of one reference on a registry record.
///
/// Not `Clone`: each handle accounts for exactly one reference.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped handle leaks its reference; pass it to `remove_ref`"]
pub struct GlobalUserHandle {
    user_id: Snowflake,
}

impl GlobalUserHandle {
    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }
}

#[derive(Debug)]
struct GlobalUserRecord {
    user: Arc<User>,
    refs: usize,
}

/// Deduplicated, reference-counted user identities
#[derive(Debug, Default)]
pub struct GlobalUserRegistry {
    users: DashMap<Snowflake, GlobalUserRecord>,
}

impl GlobalUserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the record if absent (refreshing the identity otherwise) and
    /// take one reference on it
    pub fn add_ref(&self, user: &User) -> GlobalUserHandle {
        let mut record = self
            .users
            .entry(user.id)
            .or_insert_with(|| GlobalUserRecord {
                user: Arc::new(user.clone()),
                refs: 0,
            });
        if *record.user != *user {
            record.user = Arc::new(user.clone());
        }
        record.refs += 1;
        tracing::trace!(user_id = %user.id, refs = record.refs, "User reference added");

        GlobalUserHandle { user_id: user.id }
    }

    /// Give a reference back; the record is deleted when the count reaches zero.
    ///
    /// Returns `true` if this call removed the record.
    pub fn remove_ref(&self, handle: GlobalUserHandle) -> bool {
        let removed = self
            .users
            .remove_if_mut(&handle.user_id, |_, record| {
                record.refs = record.refs.saturating_sub(1);
                record.refs == 0
            })
            .is_some();
        tracing::trace!(user_id = %handle.user_id, removed, "User reference released");
        removed
    }

    /// Current identity snapshot
    pub fn get(&self, user_id: Snowflake) -> Option<Arc<User>> {
        self.users.get(&user_id).map(|r| Arc::clone(&r.user))
    }

    /// Replace the identity of a record that is already referenced.
    ///
    /// Returns the previous snapshot, or `None` if nobody references the user.
    pub fn update(&self, user: User) -> Option<Arc<User>> {
        let mut record = self.users.get_mut(&user.id)?;
        Some(std::mem::replace(&mut record.user, Arc::new(user)))
    }

    pub fn ref_count(&self, user_id: Snowflake) -> usize {
        self.users.get(&user_id).map_or(0, |r| r.refs)
    }

    pub fn contains(&self, user_id: Snowflake) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// All live identities
    pub fn all(&self) -> Vec<Arc<User>> {
        self.users.iter().map(|r| Arc::clone(&r.user)).collect()
    }

    /// Drop every record. Outstanding handles become inert.
    pub(crate) fn clear(&self) {
        self.users.clear();
    }
}
