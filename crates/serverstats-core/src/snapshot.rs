//! Host runtime snapshot (strict, versioned).
//!
//! The host dumps its `stats()` bag as JSON. Decoding is strict: unknown
//! fields and a foreign `schema` are rejected so a shape change in the host
//! surfaces as a typed error instead of silently missing series.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StatsError};

/// Snapshot schema understood by this build.
pub const SNAPSHOT_SCHEMA: u32 = 1;

/// Per-worker statistics as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerStat {
    pub worker_id: u32,
    pub pid: u32,
    pub start_time: i64,
    pub start_seconds: f64,
    /// Only meaningful for event workers.
    #[serde(default)]
    pub dispatch_count: i64,
    /// Only meaningful for event workers.
    #[serde(default)]
    pub request_count: i64,
}

/// Point-in-time read of the host runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSnapshot {
    pub schema: u32,
    pub version: String,
    pub up: i64,
    pub reactor_threads_num: i64,
    pub requests_total: i64,
    pub start_time: i64,
    pub max_conn: i64,
    pub coroutine_num: i64,
    pub start_seconds: i64,
    pub workers_total: i64,
    pub workers_idle: i64,
    pub task_workers_total: i64,
    pub task_workers_idle: i64,
    pub user_workers_total: i64,
    pub dispatch_total: i64,
    pub connections_accepted: i64,
    pub connections_active: i64,
    pub connections_closed: i64,
    pub reload_count: i64,
    pub reload_last_time: i64,
    pub worker_vm_object_num: i64,
    pub worker_vm_resource_num: i64,
    pub worker_memory_usage: i64,
    #[serde(default)]
    pub event_workers: Vec<WorkerStat>,
    #[serde(default)]
    pub task_workers: Vec<WorkerStat>,
    #[serde(default)]
    pub user_workers: Vec<WorkerStat>,
    #[serde(default)]
    pub top_classes: ClassHistogram,
}

impl Default for ServerSnapshot {
    fn default() -> Self {
        Self {
            schema: SNAPSHOT_SCHEMA,
            version: String::new(),
            up: 0,
            reactor_threads_num: 0,
            requests_total: 0,
            start_time: 0,
            max_conn: 0,
            coroutine_num: 0,
            start_seconds: 0,
            workers_total: 0,
            workers_idle: 0,
            task_workers_total: 0,
            task_workers_idle: 0,
            user_workers_total: 0,
            dispatch_total: 0,
            connections_accepted: 0,
            connections_active: 0,
            connections_closed: 0,
            reload_count: 0,
            reload_last_time: 0,
            worker_vm_object_num: 0,
            worker_vm_resource_num: 0,
            worker_memory_usage: 0,
            event_workers: Vec::new(),
            task_workers: Vec::new(),
            user_workers: Vec::new(),
            top_classes: ClassHistogram::default(),
        }
    }
}

/// Class name -> live instance count, in the order the host reported it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassHistogram(Vec<(String, i64)>);

impl ClassHistogram {
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for ClassHistogram {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for ClassHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassHistogram {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ClassHistogram;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of class name to count")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, i64>()? {
                    entries.push((k, v));
                }
                Ok(ClassHistogram(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Decode a host snapshot dump, rejecting unknown shapes and schemas.
pub fn decode_snapshot(bytes: &[u8]) -> Result<ServerSnapshot> {
    let snap: ServerSnapshot = serde_json::from_slice(bytes)
        .map_err(|e| StatsError::InvalidSnapshot(e.to_string()))?;
    if snap.schema != SNAPSHOT_SCHEMA {
        return Err(StatsError::UnsupportedVersion(snap.schema));
    }
    Ok(snap)
}

/// Source of runtime snapshots (the host server handle).
///
/// `stats` is synchronous and must not mutate host state. A failure is fatal
/// for the request that asked for it; callers do not retry.
pub trait SnapshotProvider: Send + Sync {
    fn stats(&self) -> Result<ServerSnapshot>;
}

/// Provider that always answers with the same snapshot.
#[derive(Debug, Clone)]
pub struct StaticSnapshot(ServerSnapshot);

impl StaticSnapshot {
    pub fn new(snap: ServerSnapshot) -> Self {
        Self(snap)
    }
}

impl SnapshotProvider for StaticSnapshot {
    fn stats(&self) -> Result<ServerSnapshot> {
        Ok(self.0.clone())
    }
}
