use crate::SequenceAllocator;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-process allocator for tests and offline runs.
///
/// Atomic within one process only. Records every reservation so callers can
/// assert on counter consumption.
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    counters: Mutex<BTreeMap<String, i64>>,
    calls: Mutex<Vec<(String, u64)>>,
    unreachable: AtomicBool,
}

impl MemoryAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `counter` at `value` (next reservation begins at `value + 1`).
    pub fn with_value(self, counter: &str, value: i64) -> Self {
        if let Ok(mut c) = self.counters.lock() {
            c.insert(counter.to_string(), value);
        }
        self
    }

    pub fn value(&self, counter: &str) -> i64 {
        self.counters
            .lock()
            .map(|c| c.get(counter).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Simulate connectivity loss: every reservation fails without advancing.
    pub fn set_unreachable(&self, down: bool) {
        self.unreachable.store(down, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SequenceAllocator for MemoryAllocator {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn reserve(&self, counter: &str, count: u64) -> Result<i64> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(anyhow!("memory allocator unreachable"));
        }
        let delta = i64::try_from(count).map_err(|_| anyhow!("count too large: {count}"))?;

        let mut counters = self
            .counters
            .lock()
            .map_err(|_| anyhow!("memory allocator poisoned"))?;
        let slot = counters.entry(counter.to_string()).or_insert(0);
        *slot = slot
            .checked_add(delta)
            .ok_or_else(|| anyhow!("counter '{counter}' overflow"))?;
        let end = *slot;
        drop(counters);

        if let Ok(mut calls) = self.calls.lock() {
            calls.push((counter.to_string(), count));
        }
        Ok(end)
    }
}
