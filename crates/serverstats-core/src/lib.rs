//! serverstats core: metrics aggregation and exposition engine.
//!
//! This crate turns a host runtime snapshot into a scrape body. It owns the
//! self-traffic counter tables, the correction of counters inflated by the
//! metrics endpoint itself, label encoding, and the exposition/JSON
//! serializers. It carries no HTTP or async runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `StatsError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod format;
pub mod labels;
pub mod record;
pub mod snapshot;
pub mod table;

/// Shared result type.
pub use error::{Result, StatsError};

pub use aggregator::{MetricsAggregator, PoolSet};
pub use engine::{MetricsEngine, Scrape};
pub use format::{Format, Serializer};
pub use labels::LabelSet;
pub use record::{MetricKind, MetricRecord, MetricValue};
pub use snapshot::{ServerSnapshot, SnapshotProvider, StaticSnapshot, WorkerStat};
pub use table::{AtomicCounterTable, CounterTable, MappedCounterTable};
