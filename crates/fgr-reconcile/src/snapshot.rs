use crate::{GroupId, GroupRow, MembershipRow, SoftDelete, Uid};
use std::collections::{BTreeMap, BTreeSet};

/// Default group slot for one owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultSlot {
    /// Persisted active default group (lowest id when duplicates exist).
    Existing(GroupId),
    /// Provisioning would create it, but the pass is a dry run so it has no id yet.
    Planned,
}

/// Owner -> default group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefaultGroupIndex {
    slots: BTreeMap<Uid, DefaultSlot>,
}

impl DefaultGroupIndex {
    /// Active `is_default` groups only; duplicates collapse to the minimum id.
    /// Extra defaults are left alone (lenient repair).
    pub fn build<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'a GroupRow>,
    {
        let mut slots: BTreeMap<Uid, DefaultSlot> = BTreeMap::new();
        for g in groups.into_iter().filter(|g| g.is_active_default()) {
            slots
                .entry(g.uid.clone())
                .and_modify(|slot| {
                    if let DefaultSlot::Existing(cur) = slot {
                        if g.id < *cur {
                            *cur = g.id;
                        }
                    }
                })
                .or_insert(DefaultSlot::Existing(g.id));
        }
        Self { slots }
    }

    /// Mark owners whose default group is about to be provisioned.
    /// Owners that already have a persisted default keep it.
    pub fn plan_missing<I>(&mut self, owners: I)
    where
        I: IntoIterator<Item = Uid>,
    {
        for owner in owners {
            self.slots.entry(owner).or_insert(DefaultSlot::Planned);
        }
    }

    pub fn slot(&self, owner: &str) -> Option<DefaultSlot> {
        self.slots.get(owner).copied()
    }

    /// Persisted default group id, if any.
    pub fn get(&self, owner: &str) -> Option<GroupId> {
        match self.slots.get(owner) {
            Some(DefaultSlot::Existing(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn has_default(&self, owner: &str) -> bool {
        self.slots.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// (owner, counterpart) -> explicit group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipIndex {
    targets: BTreeMap<Uid, BTreeMap<Uid, GroupId>>,
}

impl MembershipIndex {
    /// A membership is eligible when it is active and its group exists and is active.
    /// Several eligible memberships for one pair collapse to the minimum group id.
    pub fn build(groups: &[GroupRow], memberships: &[MembershipRow]) -> Self {
        let active_groups: BTreeSet<GroupId> = groups
            .iter()
            .filter(|g| g.is_active())
            .map(|g| g.id)
            .collect();

        let mut targets: BTreeMap<Uid, BTreeMap<Uid, GroupId>> = BTreeMap::new();
        for m in memberships {
            if !m.is_active() || !active_groups.contains(&m.group_id) {
                continue;
            }
            targets
                .entry(m.uid.clone())
                .or_default()
                .entry(m.friend_uid.clone())
                .and_modify(|cur| *cur = (*cur).min(m.group_id))
                .or_insert(m.group_id);
        }
        Self { targets }
    }

    pub fn get(&self, owner: &str, counterpart: &str) -> Option<GroupId> {
        self.targets.get(owner)?.get(counterpart).copied()
    }

    /// Number of resolved pairs.
    pub fn len(&self) -> usize {
        self.targets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Both working sets, always built together from one read of the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub defaults: DefaultGroupIndex,
    pub members: MembershipIndex,
}

impl Snapshot {
    pub fn build(groups: &[GroupRow], memberships: &[MembershipRow]) -> Self {
        Self {
            defaults: DefaultGroupIndex::build(groups),
            members: MembershipIndex::build(groups, memberships),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_active_defaults_resolve_to_lowest_id() {
        let groups = vec![
            GroupRow::new(9, "U1", "a", true),
            GroupRow::new(4, "U1", "b", true),
            GroupRow::new(2, "U1", "c", true).deleted(),
            GroupRow::new(1, "U1", "d", false),
        ];
        let idx = DefaultGroupIndex::build(&groups);
        assert_eq!(idx.get("U1"), Some(4));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn planned_slot_never_shadows_existing_default() {
        let groups = vec![GroupRow::new(3, "U1", "d", true)];
        let mut idx = DefaultGroupIndex::build(&groups);
        idx.plan_missing(vec!["U1".to_string(), "U2".to_string()]);
        assert_eq!(idx.slot("U1"), Some(DefaultSlot::Existing(3)));
        assert_eq!(idx.slot("U2"), Some(DefaultSlot::Planned));
        assert_eq!(idx.get("U2"), None);
    }

    #[test]
    fn membership_in_deleted_or_unknown_group_is_ignored() {
        let groups = vec![
            GroupRow::new(10, "U1", "x", false),
            GroupRow::new(11, "U1", "y", false).deleted(),
        ];
        let members = vec![
            MembershipRow::new(11, "U1", "U2"),
            MembershipRow::new(99, "U1", "U3"),
            MembershipRow::new(10, "U1", "U4").deleted(),
        ];
        let idx = MembershipIndex::build(&groups, &members);
        assert!(idx.is_empty());
    }
}
