use crate::Tables;
use anyhow::{anyhow, bail, Result};
use fgr_reconcile::{
    EdgeId, EdgeRow, EdgeWrite, GroupInsert, GroupRefresh, GroupRow, MembershipRow, Uid,
};
use fgr_runtime::{ReconcileStore, UnitOfWork};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Where an injected failure fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    LoadEdges,
    UpsertGroups,
    RefreshGroups,
    ApplyEdges,
    Commit,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Tables,
    commits: usize,
    rollbacks: usize,
    fail_at: Option<FailPoint>,
    /// Edge moved by a simulated concurrent writer right before apply.
    interfere_with: Option<EdgeId>,
    lock_waits: Vec<Option<Duration>>,
}

/// Shared committed state. Clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new(tables: Tables) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                tables,
                ..Shared::default()
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>> {
        self.shared.lock().map_err(|_| anyhow!("memory store poisoned"))
    }

    /// Committed tables.
    pub fn tables(&self) -> Tables {
        self.lock().map(|s| s.tables.clone()).unwrap_or_default()
    }

    /// Mutate committed state between runs.
    pub fn with_tables<F: FnOnce(&mut Tables)>(&self, f: F) {
        if let Ok(mut s) = self.lock() {
            f(&mut s.tables);
        }
    }

    pub fn commits(&self) -> usize {
        self.lock().map(|s| s.commits).unwrap_or(0)
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().map(|s| s.rollbacks).unwrap_or(0)
    }

    /// Lock-wait bound passed to every `begin`, in order.
    pub fn lock_waits(&self) -> Vec<Option<Duration>> {
        self.lock().map(|s| s.lock_waits.clone()).unwrap_or_default()
    }

    pub fn fail_at(&self, point: Option<FailPoint>) {
        if let Ok(mut s) = self.lock() {
            s.fail_at = point;
        }
    }

    /// Before the next apply, move `edge` to another group inside the unit of
    /// work so the guarded update skips it.
    pub fn interfere_with(&self, edge: Option<EdgeId>) {
        if let Ok(mut s) = self.lock() {
            s.interfere_with = edge;
        }
    }
}

/// Private working copy of the tables.
#[derive(Debug)]
pub struct MemoryWork {
    store: MemoryStore,
    work: Tables,
    fail_at: Option<FailPoint>,
    interfere_with: Option<EdgeId>,
}

impl MemoryWork {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_at == Some(point) {
            bail!("injected failure at {point:?}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReconcileStore for MemoryStore {
    type Work = MemoryWork;

    async fn begin(&self, lock_wait: Option<Duration>) -> Result<MemoryWork> {
        let mut s = self.lock()?;
        s.lock_waits.push(lock_wait);
        if s.fail_at == Some(FailPoint::Begin) {
            bail!("injected failure at {:?}", FailPoint::Begin);
        }
        Ok(MemoryWork {
            store: self.clone(),
            work: s.tables.clone(),
            fail_at: s.fail_at,
            interfere_with: s.interfere_with,
        })
    }
}

#[async_trait::async_trait]
impl UnitOfWork for MemoryWork {
    async fn edge_owners(&mut self) -> Result<Vec<Uid>> {
        let owners: BTreeSet<Uid> = self.work.edges.iter().map(|e| e.uid.clone()).collect();
        Ok(owners.into_iter().collect())
    }

    async fn registry_owners(&mut self) -> Result<Vec<Uid>> {
        let users: BTreeSet<Uid> = self.work.users.iter().cloned().collect();
        Ok(users.into_iter().collect())
    }

    async fn load_groups(&mut self) -> Result<Vec<GroupRow>> {
        Ok(self.work.groups.clone())
    }

    async fn load_memberships(&mut self) -> Result<Vec<MembershipRow>> {
        Ok(self.work.memberships.clone())
    }

    async fn load_edges(&mut self) -> Result<Vec<EdgeRow>> {
        self.check(FailPoint::LoadEdges)?;
        Ok(self.work.edges.clone())
    }

    async fn upsert_default_groups(&mut self, name: &str, rows: &[GroupInsert]) -> Result<u64> {
        self.check(FailPoint::UpsertGroups)?;
        let mut affected = 0;
        for row in rows {
            match self
                .work
                .groups
                .iter_mut()
                .find(|g| g.uid == row.uid && g.name == name)
            {
                Some(g) => {
                    g.is_default = true;
                    g.is_deleted = Some(false);
                    g.version = Some(row.version);
                }
                None => {
                    let id = self.work.next_group_id();
                    let mut g = GroupRow::new(id, row.uid.clone(), name, true);
                    g.version = Some(row.version);
                    self.work.groups.push(g);
                }
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn refresh_default_groups(&mut self, rows: &[GroupRefresh]) -> Result<u64> {
        self.check(FailPoint::RefreshGroups)?;
        let mut affected = 0;
        for row in rows {
            if let Some(g) = self.work.groups.iter_mut().find(|g| g.id == row.group_id) {
                g.is_default = true;
                g.is_deleted = Some(false);
                g.version = Some(row.version);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn apply_edge_updates(&mut self, rows: &[EdgeWrite]) -> Result<u64> {
        self.check(FailPoint::ApplyEdges)?;
        if let Some(id) = self.interfere_with {
            if let Some(e) = self.work.edges.iter_mut().find(|e| e.id == id) {
                e.friend_group_id = Some(e.current_group() + 1_000_000);
            }
        }

        let mut affected = 0;
        for row in rows {
            if let Some(e) = self
                .work
                .edges
                .iter_mut()
                .find(|e| e.id == row.edge_id && e.current_group() == row.expected)
            {
                e.friend_group_id = Some(row.target);
                e.version = Some(row.version);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn commit(self) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let mut s = self.store.lock()?;
        s.tables = self.work;
        s.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        let mut s = self.store.lock()?;
        s.rollbacks += 1;
        Ok(())
    }
}
