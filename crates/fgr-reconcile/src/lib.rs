//! fgr-reconcile
//!
//! Pure reconciliation core for `friend.friend_group_id`.
//!
//! - Snapshot indexes (default group per owner, membership per pair)
//! - Resolver: membership first, default second, otherwise unresolved
//! - Diff engine producing the exact change set plus the group provisioning plan
//! - Version blocks and deterministic per-row version assignment
//!
//! Deterministic, pure logic. No IO. No store calls. No allocator calls.

mod diff;
mod resolver;
mod seed;
mod snapshot;
mod types;
mod version;

pub use diff::{
    compute_change_set, plan_provisioning, preview_provisioning, ChangeSet, EdgeChange,
    ProvisionPlan,
};
pub use resolver::{resolve, Resolution};
pub use seed::{seed_candidates, SeedStrategy};
pub use snapshot::{DefaultGroupIndex, DefaultSlot, MembershipIndex, Snapshot};
pub use types::*;
pub use version::{
    assign_versions, edge_writes, group_inserts, group_refreshes, BlockError, EdgeWrite,
    GroupInsert, GroupRefresh, VersionBlock,
};
