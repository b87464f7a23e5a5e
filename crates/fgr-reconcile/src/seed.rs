use crate::Uid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where candidate owners for default group provisioning come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Distinct `friend.uid`.
    #[default]
    Edges,
    /// Every `users.uid`.
    Registry,
    /// Both, deduplicated.
    Union,
}

impl SeedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStrategy::Edges => "edges",
            SeedStrategy::Registry => "registry",
            SeedStrategy::Union => "union",
        }
    }

    pub fn reads_edges(&self) -> bool {
        matches!(self, SeedStrategy::Edges | SeedStrategy::Union)
    }

    pub fn reads_registry(&self) -> bool {
        matches!(self, SeedStrategy::Registry | SeedStrategy::Union)
    }
}

/// Merge the owner sources the strategy selects into one sorted, unique set.
/// Sources the strategy does not read are ignored.
pub fn seed_candidates<E, R>(strategy: SeedStrategy, edge_owners: E, registry: R) -> BTreeSet<Uid>
where
    E: IntoIterator<Item = Uid>,
    R: IntoIterator<Item = Uid>,
{
    let mut out = BTreeSet::new();
    if strategy.reads_edges() {
        out.extend(edge_owners);
    }
    if strategy.reads_registry() {
        out.extend(registry);
    }
    out
}
