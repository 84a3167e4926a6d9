//! Guild-scoped user view

use kook_core::GuildMember;

use super::GlobalUserHandle;

/// A guild's view of a member: local attributes plus one reference on the
/// shared identity
#[derive(Debug)]
pub struct GuildUserRecord {
    pub member: GuildMember,
    handle: GlobalUserHandle,
}

impl GuildUserRecord {
    pub fn new(member: GuildMember, handle: GlobalUserHandle) -> Self {
        Self { member, handle }
    }

    /// Split into the member data and the reference to give back
    pub fn into_parts(self) -> (GuildMember, GlobalUserHandle) {
        (self.member, self.handle)
    }
}
