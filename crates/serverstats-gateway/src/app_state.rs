//! Shared application state for the serverstats gateway.
//!
//! Builds the counter table from `skip_table`, wires it into one
//! `MetricsEngine`, and holds the host snapshot provider. Startup errors are
//! returned, not panicked.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use serverstats_core::error::{Result, StatsError};
use serverstats_core::table::{AtomicCounterTable, CounterTable, MappedCounterTable};
use serverstats_core::{MetricsEngine, PoolSet, SnapshotProvider};

use crate::config::{SkipTableSection, StatsConfig};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: StatsConfig,
    engine: MetricsEngine,
    provider: Arc<dyn SnapshotProvider>,
}

impl AppState {
    /// Build application state, creating or attaching the counter table.
    pub fn new(cfg: StatsConfig, provider: Arc<dyn SnapshotProvider>) -> Result<Self> {
        let table = open_table(&cfg.skip_table)?;
        Ok(Self::with_table(cfg, table, provider))
    }

    /// Build application state around an existing counter table.
    pub fn with_table(
        cfg: StatsConfig,
        table: Arc<dyn CounterTable>,
        provider: Arc<dyn SnapshotProvider>,
    ) -> Self {
        let engine = MetricsEngine::new(
            table,
            &cfg.service.name,
            cfg.service.labels.clone(),
            PoolSet::from(&cfg.pools),
        );
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                engine,
                provider,
            }),
        }
    }

    pub fn cfg(&self) -> &StatsConfig {
        &self.inner.cfg
    }

    pub fn engine(&self) -> &MetricsEngine {
        &self.inner.engine
    }

    pub fn provider(&self) -> &dyn SnapshotProvider {
        self.inner.provider.as_ref()
    }

    /// Check the `Authorization` header value against the metrics gate.
    pub fn authorize_metrics(&self, authorization: Option<&str>) -> Result<()> {
        let m = &self.inner.cfg.metrics;
        if !m.secure {
            return Ok(());
        }
        let expected = m.bearer_token.as_deref().unwrap_or_default();
        match authorization.and_then(|v| v.strip_prefix("Bearer ")) {
            Some(token)
                if !expected.is_empty()
                    && bool::from(token.as_bytes().ct_eq(expected.as_bytes())) =>
            {
                Ok(())
            }
            _ => Err(StatsError::Unauthorized),
        }
    }
}

fn open_table(cfg: &SkipTableSection) -> Result<Arc<dyn CounterTable>> {
    let Some(path) = &cfg.path else {
        tracing::info!(capacity = cfg.capacity, "using in-process counter table");
        return Ok(Arc::new(AtomicCounterTable::with_capacity(cfg.capacity)));
    };

    if cfg.attach {
        let table = MappedCounterTable::open(path)?;
        if table.capacity() != cfg.capacity {
            tracing::warn!(
                configured = cfg.capacity,
                actual = table.capacity(),
                "attached counter table capacity differs from config"
            );
        }
        tracing::info!(path = %path.display(), "attached to shared counter table");
        Ok(Arc::new(table))
    } else {
        Ok(Arc::new(MappedCounterTable::create(path, cfg.capacity)?))
    }
}
