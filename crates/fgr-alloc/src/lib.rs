//! fgr-alloc
//!
//! Sequence allocator boundary. One call reserves a contiguous block of
//! versions from a named counter; the counter lives outside the reconciliation
//! unit of work and is never rolled back.

mod memory;
mod pg;
#[cfg(feature = "redis")]
mod redis_backend;

pub use memory::MemoryAllocator;
pub use pg::PgAllocator;
#[cfg(feature = "redis")]
pub use redis_backend::RedisAllocator;

use anyhow::{Context, Result};
use fgr_reconcile::VersionBlock;

/// Cross-process atomic counter.
///
/// # Contract
/// `reserve(counter, n)` advances `counter` by `n` atomically and returns the
/// value after the increment (`end`). The caller owns `[end - n + 1, end]`
/// exclusively. Implementations must not retry on connectivity loss: a
/// reservation that may or may not have happened is reported as an error.
#[async_trait::async_trait]
pub trait SequenceAllocator: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn reserve(&self, counter: &str, count: u64) -> Result<i64>;
}

/// Reserve exactly `count` versions from `counter`.
///
/// `count == 0` makes no call and returns `None`, so empty change sets never
/// burn counter space.
pub async fn reserve_block<A>(alloc: &A, counter: &str, count: usize) -> Result<Option<VersionBlock>>
where
    A: SequenceAllocator + ?Sized,
{
    if count == 0 {
        return Ok(None);
    }
    let n = u64::try_from(count).context("reservation size does not fit in u64")?;
    let end = alloc
        .reserve(counter, n)
        .await
        .with_context(|| format!("reserve {n} from {} counter '{counter}' failed", alloc.backend()))?;
    let block = VersionBlock::from_end(end, n)?;
    tracing::debug!(counter, backend = alloc.backend(), start = block.start(), last = block.last(), "reserved version block");
    Ok(Some(block))
}
