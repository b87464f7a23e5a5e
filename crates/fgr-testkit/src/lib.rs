//! fgr-testkit
//!
//! In-memory store with real unit-of-work semantics (private working copy,
//! commit publishes, rollback discards) plus fault injection, for driving the
//! orchestrator without a database.

mod memory_store;
mod tables;

pub use memory_store::{FailPoint, MemoryStore, MemoryWork};
pub use tables::Tables;
