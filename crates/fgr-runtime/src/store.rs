use anyhow::Result;
use fgr_reconcile::{EdgeRow, EdgeWrite, GroupInsert, GroupRefresh, GroupRow, MembershipRow, Uid};
use std::time::Duration;

/// Source of units of work.
#[async_trait::async_trait]
pub trait ReconcileStore: Send + Sync {
    type Work: UnitOfWork;

    /// Open one atomic unit of work. `lock_wait` bounds row lock waits inside
    /// it and does not leak to other sessions.
    async fn begin(&self, lock_wait: Option<Duration>) -> Result<Self::Work>;
}

/// One atomic unit of work. Every read sees the same snapshot; nothing is
/// visible to other sessions until `commit`.
///
/// Write methods return the number of rows affected. Callers compare that
/// against the number of versions they reserved.
#[async_trait::async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Distinct `friend.uid`.
    async fn edge_owners(&mut self) -> Result<Vec<Uid>>;

    /// Every registered user id.
    async fn registry_owners(&mut self) -> Result<Vec<Uid>>;

    async fn load_groups(&mut self) -> Result<Vec<GroupRow>>;

    async fn load_memberships(&mut self) -> Result<Vec<MembershipRow>>;

    /// All edges, row-locked until the unit of work ends.
    async fn load_edges(&mut self) -> Result<Vec<EdgeRow>>;

    /// Insert a default group named `name` per row, or resurrect the row that
    /// already holds `(uid, name)`.
    async fn upsert_default_groups(&mut self, name: &str, rows: &[GroupInsert]) -> Result<u64>;

    async fn refresh_default_groups(&mut self, rows: &[GroupRefresh]) -> Result<u64>;

    /// Set `friend_group_id` and `version` on each edge whose current group
    /// still equals `expected`.
    async fn apply_edge_updates(&mut self, rows: &[EdgeWrite]) -> Result<u64>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
