//! fgr-runtime
//!
//! Orchestrates one reconciliation pass over a store and a sequence allocator:
//! Begin -> ProvisionGroups -> SnapshotBuild -> DiffCompute ->
//! (DryRunExit | VersionAllocate -> Apply) -> Commit, with Rollback on any error.
//!
//! The store and allocator are collaborator traits; this crate has no database
//! driver of its own.

mod engine;
mod error;
mod options;
mod report;
mod store;

pub use engine::run_reconciliation;
pub use error::{ApplyMismatch, ApplyTarget};
pub use options::{CounterKeys, Provisioning, ReconcileOptions};
pub use report::{Phase, RunReport};
pub use store::{ReconcileStore, UnitOfWork};
