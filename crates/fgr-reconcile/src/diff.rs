use crate::{resolve, EdgeFilter, EdgeId, EdgeRow, GroupId, GroupRow, Resolution, Snapshot, Uid};
use std::collections::BTreeSet;

/// One edge whose stored group differs from its resolved group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeChange {
    pub edge_id: EdgeId,
    pub owner: Uid,
    pub counterpart: Uid,
    /// Stored `friend_group_id` with `NULL` folded to 0.
    pub current: GroupId,
    pub target: GroupId,
    pub via_membership: bool,
}

/// Output of the diff engine for one snapshot + filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Sorted by `edge_id` ascending; this is the version assignment order.
    pub changes: Vec<EdgeChange>,
    /// Edges that would move into a default group that a dry run did not create.
    pub awaiting_default: Vec<EdgeId>,
    /// Edges with no membership and no default group. Not written.
    pub unresolved: Vec<EdgeId>,
    /// Edges rejected by the filter before resolution.
    pub filtered_out: usize,
    /// Edges examined.
    pub scanned: usize,
}

impl ChangeSet {
    /// Number of edge rows a full run writes (or would write).
    pub fn to_update(&self) -> usize {
        self.changes.len() + self.awaiting_default.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_update() == 0
    }
}

/// Diff the current edges against the snapshot.
///
/// An edge is included iff `coalesce(friend_group_id, 0) != target`. Output is a
/// pure function of the inputs; input order does not matter.
pub fn compute_change_set(edges: &[EdgeRow], snapshot: &Snapshot, filter: &EdgeFilter) -> ChangeSet {
    let mut out = ChangeSet::default();

    for edge in edges {
        out.scanned += 1;
        if !filter.admits(edge) {
            out.filtered_out += 1;
            continue;
        }

        let (target, via_membership) = match resolve(snapshot, &edge.uid, &edge.to_uid) {
            Resolution::Membership(id) => (id, true),
            Resolution::Default(id) => (id, false),
            Resolution::PendingDefault => {
                out.awaiting_default.push(edge.id);
                continue;
            }
            Resolution::Unresolved => {
                out.unresolved.push(edge.id);
                continue;
            }
        };

        if edge.current_group() != target {
            out.changes.push(EdgeChange {
                edge_id: edge.id,
                owner: edge.uid.clone(),
                counterpart: edge.to_uid.clone(),
                current: edge.current_group(),
                target,
                via_membership,
            });
        }
    }

    out.changes.sort_by_key(|c| c.edge_id);
    out.awaiting_default.sort_unstable();
    out.unresolved.sort_unstable();
    out
}

/// Default group provisioning split over the candidate owners.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionPlan {
    /// Candidates with no active default group. Sorted by uid.
    pub missing_owners: Vec<Uid>,
    /// Active default groups owned by candidates. Sorted by id.
    pub existing_groups: Vec<GroupId>,
}

impl ProvisionPlan {
    pub fn is_empty(&self) -> bool {
        self.missing_owners.is_empty() && self.existing_groups.is_empty()
    }
}

/// Split candidates into "insert a default" and "refresh the defaults they have".
/// An owner lands in exactly one of the two sides.
pub fn plan_provisioning(candidates: &BTreeSet<Uid>, groups: &[GroupRow]) -> ProvisionPlan {
    let mut with_default: BTreeSet<&str> = BTreeSet::new();
    let mut existing_groups: Vec<GroupId> = Vec::new();

    for g in groups.iter().filter(|g| g.is_active_default()) {
        if candidates.contains(&g.uid) {
            with_default.insert(g.uid.as_str());
            existing_groups.push(g.id);
        }
    }
    existing_groups.sort_unstable();
    existing_groups.dedup();

    let missing_owners = candidates
        .iter()
        .filter(|uid| !with_default.contains(uid.as_str()))
        .cloned()
        .collect();

    ProvisionPlan {
        missing_owners,
        existing_groups,
    }
}

/// Groups as they read once `plan` is persisted under `default_name`, without
/// touching the store. A row already holding `(uid, default_name)` is revived in
/// place as the owner's active default and keeps its id. Returns the previewed
/// groups and the owners that still need a brand-new row.
pub fn preview_provisioning(
    groups: &[GroupRow],
    default_name: &str,
    plan: &ProvisionPlan,
) -> (Vec<GroupRow>, Vec<Uid>) {
    let mut preview = groups.to_vec();
    let mut brand_new = Vec::new();

    for owner in &plan.missing_owners {
        match preview
            .iter_mut()
            .filter(|g| g.uid == *owner && g.name == default_name)
            .min_by_key(|g| g.id)
        {
            Some(g) => {
                g.is_default = true;
                g.is_deleted = Some(false);
            }
            None => brand_new.push(owner.clone()),
        }
    }

    (preview, brand_new)
}
