//! serverstats: pull-based metrics for an OpenSwoole-style host runtime.
//!
//! Depend on this crate alone to get the engine (`core`) and the HTTP
//! surface (`gateway`). The most used engine types are re-exported at the
//! root.

pub mod core {
    pub use serverstats_core::*;
}

pub mod gateway {
    pub use serverstats_gateway::*;
}

pub use serverstats_core::{
    Format, LabelSet, MetricsEngine, PoolSet, Result, ServerSnapshot, SnapshotProvider, StatsError,
};
