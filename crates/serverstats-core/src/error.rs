//! Shared error type across serverstats crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed configuration.
    BadRequest,
    /// Bearer token missing or wrong.
    Unauthorized,
    /// Counter table has no free rows left.
    ResourceExhausted,
    /// Host runtime could not be read.
    SnapshotUnavailable,
    /// Host runtime answered with an unexpected shape.
    InvalidSnapshot,
    /// Unsupported config or snapshot schema version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unauthorized => "UNAUTHORIZED",
            ClientCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ClientCode::SnapshotUnavailable => "SNAPSHOT_UNAVAILABLE",
            ClientCode::InvalidSnapshot => "INVALID_SNAPSHOT",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("counter table full (capacity {capacity})")]
    ResourceExhausted { capacity: usize },
    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u32),
    #[error("internal: {0}")]
    Internal(String),
}

impl StatsError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            StatsError::BadRequest(_) => ClientCode::BadRequest,
            StatsError::Unauthorized => ClientCode::Unauthorized,
            StatsError::ResourceExhausted { .. } => ClientCode::ResourceExhausted,
            StatsError::SnapshotUnavailable(_) => ClientCode::SnapshotUnavailable,
            StatsError::InvalidSnapshot(_) => ClientCode::InvalidSnapshot,
            StatsError::UnsupportedVersion(_) => ClientCode::UnsupportedVersion,
            StatsError::Internal(_) => ClientCode::Internal,
        }
    }
}
