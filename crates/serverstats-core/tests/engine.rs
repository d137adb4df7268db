//! End-to-end request pipeline.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serverstats_core::snapshot::{ServerSnapshot, SnapshotProvider};
use serverstats_core::table::{AtomicCounterTable, CounterTable, GLOBAL_KEY};
use serverstats_core::{
    Format, LabelSet, MetricsEngine, PoolSet, Result, StaticSnapshot, StatsError,
};

mod vector_loader;
use vector_loader::load_snapshot;

struct Unreachable;

impl SnapshotProvider for Unreachable {
    fn stats(&self) -> Result<ServerSnapshot> {
        Err(StatsError::SnapshotUnavailable("server handle gone".into()))
    }
}

fn engine(capacity: usize) -> (Arc<AtomicCounterTable>, MetricsEngine) {
    let table = Arc::new(AtomicCounterTable::with_capacity(capacity));
    let engine = MetricsEngine::new(
        table.clone(),
        "openswoole",
        LabelSet::new(),
        PoolSet::default(),
    );
    (table, engine)
}

#[test]
fn each_scrape_is_counted_before_the_snapshot_read() {
    let (table, engine) = engine(16);
    let provider = StaticSnapshot::new(load_snapshot("snapshot_basic.json"));

    let first = engine.scrape(&provider, 2, Format::Exposition).unwrap();
    let first = std::str::from_utf8(&first.body).unwrap().to_string();
    assert!(first.contains("openswoole_requests_total{service=\"openswoole\"} 119\n"));
    assert!(first.contains("worker_id=\"2\"} 49\n"));

    let second = engine.scrape(&provider, 2, Format::Exposition).unwrap();
    assert!(!second.degraded);
    let second = std::str::from_utf8(&second.body).unwrap();
    assert!(second.contains("openswoole_requests_total{service=\"openswoole\"} 118\n"));

    assert_eq!(table.get(GLOBAL_KEY), 2);
    assert_eq!(table.get("metrics-2"), 2);
}

#[test]
fn json_mode_renders_json() {
    let (_, engine) = engine(16);
    let provider = StaticSnapshot::new(load_snapshot("snapshot_basic.json"));

    let scrape = engine.scrape(&provider, 0, Format::Json).unwrap();
    assert_eq!(scrape.content_type, "application/json");
    let doc: serde_json::Value = serde_json::from_slice(&scrape.body).unwrap();
    assert_eq!(doc["openswoole_requests_total"][0]["value"], 119);
}

#[test]
fn full_table_degrades_instead_of_failing() {
    // Room for the global key only; the worker key cannot be created.
    let (table, engine) = engine(1);
    let provider = StaticSnapshot::new(load_snapshot("snapshot_basic.json"));

    let scrape = engine.scrape(&provider, 2, Format::Exposition).unwrap();
    assert!(scrape.degraded);
    let body = std::str::from_utf8(&scrape.body).unwrap();
    assert!(body.contains("openswoole_requests_total{service=\"openswoole\"} 119\n"));
    assert!(body.contains("worker_id=\"2\"} 50\n"));
    assert_eq!(table.len(), 1);
}

#[test]
fn snapshot_failure_fails_the_scrape() {
    let (table, engine) = engine(16);
    let err = engine.scrape(&Unreachable, 0, Format::Exposition).unwrap_err();
    assert_eq!(err.client_code().as_str(), "SNAPSHOT_UNAVAILABLE");
    // The hit was still counted; it happened before the snapshot read.
    assert_eq!(table.get(GLOBAL_KEY), 1);
}
