//! Self-traffic counter tables.
//!
//! Every hit on the metrics endpoint bumps `metrics` and `metrics-<worker_id>`
//! so the aggregator can subtract the scraper's own requests from the host
//! counters. Two backings share one slot algorithm:
//! - [`AtomicCounterTable`]: heap slots, visible to threads of one process.
//! - [`MappedCounterTable`]: slots in a shared file mapping, visible to every
//!   worker process that maps the same file.
//!
//! Both are fixed-capacity. A distinct key beyond capacity is reported as
//! `StatsError::ResourceExhausted`; existing rows are never touched.

mod mapped;
mod slots;

use crate::error::Result;

pub use mapped::MappedCounterTable;
pub use slots::KEY_MAX;

/// Default number of distinct keys a table can hold.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Key counting every metrics request across all workers.
pub const GLOBAL_KEY: &str = "metrics";

/// Key counting metrics requests served by one worker.
pub fn worker_key(worker_id: u32) -> String {
    format!("{GLOBAL_KEY}-{worker_id}")
}

/// Subtract the self-traffic `skip` from `raw`, clamped at zero.
pub fn correct(raw: i64, skip: u64) -> i64 {
    let skip = i64::try_from(skip).unwrap_or(i64::MAX);
    raw.saturating_sub(skip).max(0)
}

/// Process-shared key -> monotonic counter store.
pub trait CounterTable: Send + Sync {
    /// Atomically add one to `key`, creating the row on first use.
    /// Returns the value after the increment.
    fn increment(&self, key: &str) -> Result<u64>;

    /// Current value of `key`, `0` when it was never incremented. Never blocks.
    fn get(&self, key: &str) -> u64;

    /// Maximum number of distinct keys.
    fn capacity(&self) -> usize;

    /// Number of rows in use.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process table backed by heap slots.
pub struct AtomicCounterTable {
    slots: Box<[slots::Slot]>,
}

impl AtomicCounterTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| slots::Slot::default()).collect(),
        }
    }
}

impl Default for AtomicCounterTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CounterTable for AtomicCounterTable {
    fn increment(&self, key: &str) -> Result<u64> {
        slots::increment(&self.slots, key)
    }

    fn get(&self, key: &str) -> u64 {
        slots::get(&self.slots, key)
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        slots::occupied(&self.slots)
    }
}
