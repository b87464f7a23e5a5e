use fgr_reconcile::{EdgeFilter, SeedStrategy};
use std::time::Duration;

/// Whether and how default groups are provisioned before the diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provisioning {
    /// Use existing default groups only.
    Skip,
    Seed(SeedStrategy),
}

impl Default for Provisioning {
    fn default() -> Self {
        Provisioning::Seed(SeedStrategy::Edges)
    }
}

/// Allocator counter names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterKeys {
    pub edge: String,
    pub group: String,
}

impl Default for CounterKeys {
    fn default() -> Self {
        Self {
            edge: "seq:friend".to_string(),
            group: "seq:friendGroup".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    pub default_group_name: String,
    pub lock_wait: Option<Duration>,
    pub provisioning: Provisioning,
    pub edge_filter: EdgeFilter,
    pub counters: CounterKeys,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            default_group_name: "我的好友".to_string(),
            lock_wait: None,
            provisioning: Provisioning::default(),
            edge_filter: EdgeFilter::default(),
            counters: CounterKeys::default(),
        }
    }
}
