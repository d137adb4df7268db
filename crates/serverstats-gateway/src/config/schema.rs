use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use serverstats_core::error::{Result, StatsError};
use serverstats_core::labels::{is_valid_label_name, SERVICE_LABEL};
use serverstats_core::table::DEFAULT_CAPACITY;
use serverstats_core::{LabelSet, PoolSet};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub pools: PoolsSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub skip_table: SkipTableSection,

    #[serde(default)]
    pub snapshot: SnapshotSection,
}

impl StatsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(StatsError::UnsupportedVersion(self.version));
        }

        self.gateway.validate()?;
        self.service.validate()?;
        self.metrics.validate()?;
        self.skip_table.validate()?;

        if self.gateway.websocket && self.metrics.endpoint == "/" {
            return Err(StatsError::BadRequest(
                "metrics.endpoint must not be \"/\" in websocket mode".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Id of the host worker this process serves as.
    #[serde(default)]
    pub worker_id: u32,

    /// Host runs as a WebSocket server.
    #[serde(default)]
    pub websocket: bool,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            worker_id: 0,
            websocket: false,
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|e| {
            StatsError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}"))
        })?;
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:9502".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Extra labels attached to every series, in this order.
    #[serde(default)]
    pub labels: LabelSet,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            labels: LabelSet::new(),
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StatsError::BadRequest("service.name must not be empty".into()));
        }
        for (name, _) in self.labels.iter() {
            if !is_valid_label_name(name) {
                return Err(StatsError::BadRequest(format!(
                    "service.labels: invalid label name {name:?}"
                )));
            }
            if RESERVED_LABELS.contains(&name) || name.starts_with("__") {
                return Err(StatsError::BadRequest(format!(
                    "service.labels: label name {name:?} is reserved"
                )));
            }
            if name == SERVICE_LABEL {
                tracing::warn!("service.labels.service is overridden by service.name");
            }
        }
        Ok(())
    }
}

/// Per-sample label names set by the aggregator.
const RESERVED_LABELS: [&str; 3] = ["worker_id", "class_name", "version"];

fn default_service_name() -> String {
    "openswoole".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolsSection {
    #[serde(default = "default_true")]
    pub task_workers: bool,

    #[serde(default = "default_true")]
    pub user_workers: bool,
}

impl Default for PoolsSection {
    fn default() -> Self {
        Self {
            task_workers: true,
            user_workers: true,
        }
    }
}

impl From<&PoolsSection> for PoolSet {
    fn from(p: &PoolsSection) -> Self {
        PoolSet {
            task_workers: p.task_workers,
            user_workers: p.user_workers,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Require `Authorization: Bearer <bearer_token>`.
    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            secure: false,
            bearer_token: None,
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with('/') {
            return Err(StatsError::BadRequest(
                "metrics.endpoint must start with '/'".into(),
            ));
        }
        if self.endpoint.contains([':', '*', '{', '}']) || self.endpoint.contains("//") {
            return Err(StatsError::BadRequest(
                "metrics.endpoint must be a static path".into(),
            ));
        }
        if self.endpoint == "/healthz" {
            return Err(StatsError::BadRequest(
                "metrics.endpoint collides with /healthz".into(),
            ));
        }
        let has_token = self
            .bearer_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if self.secure && !has_token {
            return Err(StatsError::BadRequest(
                "metrics.secure requires metrics.bearer_token".into(),
            ));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "/metrics".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipTableSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Shared mapping file. Without it the table is private to this process.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Attach to a table another process created instead of creating it.
    #[serde(default)]
    pub attach: bool,
}

impl Default for SkipTableSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            path: None,
            attach: false,
        }
    }
}

impl SkipTableSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65536).contains(&self.capacity) {
            return Err(StatsError::BadRequest(
                "skip_table.capacity must be between 1 and 65536".into(),
            ));
        }
        if self.attach && self.path.is_none() {
            return Err(StatsError::BadRequest(
                "skip_table.attach requires skip_table.path".into(),
            ));
        }
        Ok(())
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotSection {
    /// JSON stats dump maintained by the host.
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("/run/openswoole/stats.json")
}
