//! Request pipeline: record self-hit -> snapshot -> aggregate -> render.
//!
//! One engine serves every execution mode; which pools exist is a
//! [`PoolSet`] capability, not a separate code path.

use std::sync::Arc;

use bytes::Bytes;

use crate::aggregator::{MetricsAggregator, PoolSet};
use crate::error::Result;
use crate::format::Format;
use crate::labels::LabelSet;
use crate::snapshot::SnapshotProvider;
use crate::table::{worker_key, CounterTable, GLOBAL_KEY};

/// Rendered scrape body plus how it was produced.
#[derive(Debug, Clone)]
pub struct Scrape {
    pub body: Bytes,
    pub content_type: &'static str,
    /// Self-traffic could not be recorded; counters are corrected
    /// with whatever the table already held.
    pub degraded: bool,
}

pub struct MetricsEngine {
    table: Arc<dyn CounterTable>,
    aggregator: MetricsAggregator,
}

impl MetricsEngine {
    /// `base_labels` are the configured labels; `service` is appended here.
    pub fn new(
        table: Arc<dyn CounterTable>,
        service: &str,
        base_labels: LabelSet,
        pools: PoolSet,
    ) -> Self {
        let labels = base_labels.with_service(service);
        let aggregator = MetricsAggregator::new(Arc::clone(&table), labels, pools);
        Self { table, aggregator }
    }

    pub fn table(&self) -> &Arc<dyn CounterTable> {
        &self.table
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    /// Count this metrics request for the global and the worker key.
    ///
    /// Returns `false` when either increment failed. The request is still
    /// served (best-effort correction); the failure is logged here.
    pub fn record_self_hit(&self, worker_id: u32) -> bool {
        let mut ok = true;
        for key in [GLOBAL_KEY.to_string(), worker_key(worker_id)] {
            if let Err(e) = self.table.increment(&key) {
                tracing::warn!(
                    key = %key,
                    code = e.client_code().as_str(),
                    error = %e,
                    "self-traffic counter not recorded; serving uncorrected delta"
                );
                ok = false;
            }
        }
        ok
    }

    /// Full scrape for a request served by `worker_id`.
    pub fn scrape(
        &self,
        provider: &dyn SnapshotProvider,
        worker_id: u32,
        format: Format,
    ) -> Result<Scrape> {
        let degraded = !self.record_self_hit(worker_id);

        let snap = provider.stats()?;
        let records = self.aggregator.aggregate(&snap);

        let serializer = format.serializer();
        let body = serializer.render(&records)?;
        tracing::debug!(
            records = records.len(),
            bytes = body.len(),
            ?format,
            degraded,
            "metrics rendered"
        );

        Ok(Scrape {
            body,
            content_type: serializer.content_type(),
            degraded,
        })
    }
}
