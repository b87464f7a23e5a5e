use crate::{Provisioning, ReconcileOptions};
use chrono::{DateTime, Utc};
use fgr_reconcile::VersionBlock;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Orchestrator states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Begin,
    ProvisionGroups,
    SnapshotBuild,
    DiffCompute,
    DryRunExit,
    VersionAllocate,
    Apply,
    Commit,
    Rollback,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Begin => "begin",
            Phase::ProvisionGroups => "provision_groups",
            Phase::SnapshotBuild => "snapshot_build",
            Phase::DiffCompute => "diff_compute",
            Phase::DryRunExit => "dry_run_exit",
            Phase::VersionAllocate => "version_allocate",
            Phase::Apply => "apply",
            Phase::Commit => "commit",
            Phase::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pass. In a dry run the counts describe what a full run
/// would do; nothing was written and no versions were reserved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub committed: bool,
    pub config_hash: Option<String>,

    // provisioning
    pub provisioning_skipped: bool,
    pub seed_strategy: Option<String>,
    pub candidate_owners: usize,
    pub groups_missing: usize,
    pub groups_existing: usize,
    pub groups_inserted: u64,
    pub groups_refreshed: u64,
    pub group_insert_block: Option<VersionBlock>,
    pub group_refresh_block: Option<VersionBlock>,

    // edges
    pub edges_scanned: usize,
    pub edges_filtered_out: usize,
    pub to_update: usize,
    pub updated: u64,
    pub unresolved: usize,
    /// Dry run only: edges that resolve to a default group not yet created.
    pub awaiting_default: usize,
    pub edge_block: Option<VersionBlock>,
}

impl RunReport {
    pub fn new(run_id: Uuid, opts: &ReconcileOptions) -> Self {
        let (provisioning_skipped, seed_strategy) = match opts.provisioning {
            Provisioning::Skip => (true, None),
            Provisioning::Seed(s) => (false, Some(s.as_str().to_string())),
        };
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            dry_run: opts.dry_run,
            committed: false,
            config_hash: None,
            provisioning_skipped,
            seed_strategy,
            candidate_owners: 0,
            groups_missing: 0,
            groups_existing: 0,
            groups_inserted: 0,
            groups_refreshed: 0,
            group_insert_block: None,
            group_refresh_block: None,
            edges_scanned: 0,
            edges_filtered_out: 0,
            to_update: 0,
            updated: 0,
            unresolved: 0,
            awaiting_default: 0,
            edge_block: None,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// `key=value` lines, one fact per line, stable order.
    pub fn to_kv_lines(&self) -> Vec<String> {
        fn opt<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_else(|| "-".to_string())
        }

        vec![
            format!("run_id={}", self.run_id),
            format!("started_at_utc={}", self.started_at.to_rfc3339()),
            format!(
                "finished_at_utc={}",
                opt(&self.finished_at.map(|t| t.to_rfc3339()))
            ),
            format!("dry_run={}", self.dry_run),
            format!("committed={}", self.committed),
            format!("config_hash={}", opt(&self.config_hash)),
            format!("provisioning_skipped={}", self.provisioning_skipped),
            format!("seed_strategy={}", opt(&self.seed_strategy)),
            format!("candidate_owners={}", self.candidate_owners),
            format!("groups_missing={}", self.groups_missing),
            format!("groups_existing={}", self.groups_existing),
            format!("groups_inserted={}", self.groups_inserted),
            format!("groups_refreshed={}", self.groups_refreshed),
            format!("group_insert_block={}", opt(&self.group_insert_block)),
            format!("group_refresh_block={}", opt(&self.group_refresh_block)),
            format!("edges_scanned={}", self.edges_scanned),
            format!("edges_filtered_out={}", self.edges_filtered_out),
            format!("to_update={}", self.to_update),
            format!("updated={}", self.updated),
            format!("unresolved={}", self.unresolved),
            format!("awaiting_default={}", self.awaiting_default),
            format!("edge_block={}", opt(&self.edge_block)),
        ]
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgr_reconcile::SeedStrategy;

    #[test]
    fn kv_lines_mark_absent_values() {
        let opts = ReconcileOptions {
            provisioning: Provisioning::Skip,
            ..ReconcileOptions::default()
        };
        let r = RunReport::new(Uuid::nil(), &opts);
        let lines = r.to_kv_lines();
        assert!(lines.contains(&"provisioning_skipped=true".to_string()));
        assert!(lines.contains(&"seed_strategy=-".to_string()));
        assert!(lines.contains(&"edge_block=-".to_string()));
    }

    #[test]
    fn blocks_render_inclusive_range() {
        let opts = ReconcileOptions {
            provisioning: Provisioning::Seed(SeedStrategy::Union),
            ..ReconcileOptions::default()
        };
        let mut r = RunReport::new(Uuid::nil(), &opts);
        r.edge_block = Some(VersionBlock::from_end(500, 3).unwrap());
        let lines = r.to_kv_lines();
        assert!(lines.contains(&"seed_strategy=union".to_string()));
        assert!(lines.contains(&"edge_block=[498, 500]".to_string()));

        let json: serde_json::Value = serde_json::from_str(&r.to_json().unwrap()).unwrap();
        assert_eq!(json["edge_block"]["start"], 498);
        assert_eq!(json["edge_block"]["len"], 3);
    }
}
