//! Snapshot -> corrected metric records.
//!
//! The aggregator is the only place that knows metric names, kinds and their
//! order. It subtracts the self-traffic counters from the host counters the
//! metrics endpoint inflates, then emits globals, per-worker groups and the
//! class histogram. Worker order follows the snapshot (not sorted).

use std::sync::Arc;

use crate::labels::LabelSet;
use crate::record::{ExtraLabel, MetricKind, MetricRecord, MetricValue};
use crate::snapshot::{ServerSnapshot, WorkerStat};
use crate::table::{correct, worker_key, CounterTable, GLOBAL_KEY};

/// Which optional worker pools the host runs. Event workers always exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSet {
    pub task_workers: bool,
    pub user_workers: bool,
}

impl Default for PoolSet {
    fn default() -> Self {
        Self {
            task_workers: true,
            user_workers: true,
        }
    }
}

/// Builds records from a snapshot, reading (never writing) the counter table.
pub struct MetricsAggregator {
    table: Arc<dyn CounterTable>,
    labels: Arc<LabelSet>,
    pools: PoolSet,
}

impl MetricsAggregator {
    /// `labels` should already carry the `service` label
    /// (see [`LabelSet::with_service`]).
    pub fn new(table: Arc<dyn CounterTable>, labels: LabelSet, pools: PoolSet) -> Self {
        Self {
            table,
            labels: Arc::new(labels),
            pools,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn aggregate(&self, snap: &ServerSnapshot) -> Vec<MetricRecord> {
        let global_skip = self.table.get(GLOBAL_KEY);
        let requests_total = correct(snap.requests_total, global_skip);
        let connections_accepted = correct(snap.connections_accepted, global_skip);

        let mut out = Records::new(Arc::clone(&self.labels));

        out.push_with(
            "openswoole_info",
            MetricKind::Gauge,
            ("version", snap.version.clone()),
            1_i64,
        );
        out.gauge("openswoole_up", snap.up);
        out.gauge("openswoole_reactor_threads_num", snap.reactor_threads_num);
        out.push(
            "openswoole_requests_total",
            MetricKind::Counter,
            requests_total,
        );
        out.gauge("openswoole_start_time", snap.start_time);
        out.gauge("openswoole_max_conn", snap.max_conn);
        out.gauge("openswoole_coroutine_num", snap.coroutine_num);
        out.gauge("openswoole_start_seconds", snap.start_seconds);
        out.gauge("openswoole_workers_total", snap.workers_total);
        out.gauge("openswoole_workers_idle", snap.workers_idle);
        out.gauge("openswoole_task_workers_total", snap.task_workers_total);
        out.gauge("openswoole_task_workers_idle", snap.task_workers_idle);
        out.gauge("openswoole_user_workers_total", snap.user_workers_total);
        out.gauge("openswoole_dispatch_total", snap.dispatch_total);
        out.gauge("openswoole_connections_accepted", connections_accepted);
        out.gauge("openswoole_connections_active", snap.connections_active);
        out.gauge("openswoole_connections_closed", snap.connections_closed);
        out.gauge("openswoole_reload_count", snap.reload_count);
        out.gauge("openswoole_reload_last_time", snap.reload_last_time);
        out.gauge(
            "openswoole_worker_vm_object_num",
            snap.worker_vm_object_num,
        );
        out.gauge(
            "openswoole_worker_vm_resource_num",
            snap.worker_vm_resource_num,
        );
        out.gauge("openswoole_worker_memory_usage", snap.worker_memory_usage);

        let events = &snap.event_workers;
        out.worker_times(EVENT_TIMES, events);

        // One skip read per worker, shared by both corrected series.
        let skips: Vec<u64> = events
            .iter()
            .map(|w| self.table.get(&worker_key(w.worker_id)))
            .collect();
        out.worker_counts(EVENT_COUNTS, events, &skips);

        if self.pools.task_workers {
            out.worker_times(TASK_TIMES, &snap.task_workers);
        }
        if self.pools.user_workers {
            out.worker_times(USER_TIMES, &snap.user_workers);
        }

        for (class, count) in snap.top_classes.iter() {
            out.push_with(
                "openswoole_top_classes_total",
                MetricKind::Counter,
                ("class_name", class.to_string()),
                count,
            );
        }

        out.records
    }
}

/// `[start_time, start_seconds]` series names per pool.
const EVENT_TIMES: [&str; 2] = [
    "openswoole_event_workers_start_time",
    "openswoole_event_workers_start_seconds",
];
const TASK_TIMES: [&str; 2] = [
    "openswoole_task_workers_start_time",
    "openswoole_task_workers_start_seconds",
];
const USER_TIMES: [&str; 2] = [
    "openswoole_user_workers_start_time",
    "openswoole_user_workers_start_seconds",
];

/// `[dispatch_count, request_count]`, corrected by the worker's skip count.
const EVENT_COUNTS: [&str; 2] = [
    "openswoole_event_workers_dispatch_count",
    "openswoole_event_workers_request_count",
];

struct Records {
    labels: Arc<LabelSet>,
    records: Vec<MetricRecord>,
}

impl Records {
    fn new(labels: Arc<LabelSet>) -> Self {
        Self {
            labels,
            records: Vec::with_capacity(64),
        }
    }

    fn record(
        &mut self,
        name: &'static str,
        kind: MetricKind,
        extra: Option<ExtraLabel>,
        value: MetricValue,
    ) {
        self.records.push(MetricRecord {
            name,
            kind,
            labels: Arc::clone(&self.labels),
            extra,
            value,
        });
    }

    fn push(&mut self, name: &'static str, kind: MetricKind, value: impl Into<MetricValue>) {
        self.record(name, kind, None, value.into());
    }

    fn gauge(&mut self, name: &'static str, value: impl Into<MetricValue>) {
        self.push(name, MetricKind::Gauge, value);
    }

    fn push_with(
        &mut self,
        name: &'static str,
        kind: MetricKind,
        (label, label_value): (&'static str, String),
        value: impl Into<MetricValue>,
    ) {
        let extra = ExtraLabel {
            name: label,
            value: label_value,
        };
        self.record(name, kind, Some(extra), value.into());
    }

    fn per_worker(&mut self, name: &'static str, w: &WorkerStat, value: MetricValue) {
        let id = w.worker_id.to_string();
        self.push_with(name, MetricKind::Gauge, ("worker_id", id), value);
    }

    fn worker_times(
        &mut self,
        [start_time, start_seconds]: [&'static str; 2],
        workers: &[WorkerStat],
    ) {
        for w in workers {
            self.per_worker(start_time, w, w.start_time.into());
        }
        for w in workers {
            self.per_worker(start_seconds, w, w.start_seconds.into());
        }
    }

    fn worker_counts(
        &mut self,
        [dispatch, request]: [&'static str; 2],
        workers: &[WorkerStat],
        skips: &[u64],
    ) {
        for (w, skip) in workers.iter().zip(skips) {
            self.per_worker(dispatch, w, correct(w.dispatch_count, *skip).into());
        }
        for (w, skip) in workers.iter().zip(skips) {
            self.per_worker(request, w, correct(w.request_count, *skip).into());
        }
    }
}
