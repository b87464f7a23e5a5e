use crate::{DefaultSlot, GroupId, Snapshot};

/// Where an edge should live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// An active membership names the group.
    Membership(GroupId),
    /// No membership; the owner's default group.
    Default(GroupId),
    /// No membership; the owner's default group does not exist yet (dry run).
    PendingDefault,
    /// Neither a membership nor a default group. Edge is left untouched.
    Unresolved,
}

impl Resolution {
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Resolution::Membership(id) | Resolution::Default(id) => Some(*id),
            Resolution::PendingDefault | Resolution::Unresolved => None,
        }
    }
}

/// Membership first, default second. Never the reverse.
pub fn resolve(snapshot: &Snapshot, owner: &str, counterpart: &str) -> Resolution {
    if let Some(id) = snapshot.members.get(owner, counterpart) {
        return Resolution::Membership(id);
    }
    match snapshot.defaults.slot(owner) {
        Some(DefaultSlot::Existing(id)) => Resolution::Default(id),
        Some(DefaultSlot::Planned) => Resolution::PendingDefault,
        None => Resolution::Unresolved,
    }
}
