//! Host snapshot providers.

use std::fs;
use std::path::PathBuf;

use serverstats_core::error::{Result, StatsError};
use serverstats_core::snapshot::{decode_snapshot, ServerSnapshot, SnapshotProvider};

/// Reads the JSON stats dump the host keeps refreshed on disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotProvider for FileSnapshotProvider {
    fn stats(&self) -> Result<ServerSnapshot> {
        let bytes = fs::read(&self.path).map_err(|e| {
            StatsError::SnapshotUnavailable(format!("read {}: {e}", self.path.display()))
        })?;
        decode_snapshot(&bytes)
    }
}
