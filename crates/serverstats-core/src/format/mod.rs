//! Output formats for metric records.
//!
//! Two interchangeable back ends render the same record slice:
//! - Exposition: Prometheus-style `# TYPE` groups terminated by `# EOF`.
//! - JSON: one key per metric name holding a list of observations.
//!
//! Neither touches counters; correction happens once in the aggregator.

pub mod json;
pub mod text;

use bytes::Bytes;

use crate::error::Result;
use crate::record::MetricRecord;

pub use json::JsonSerializer;
pub use text::ExpositionSerializer;

/// Renders a record slice into a response body.
pub trait Serializer: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn render(&self, records: &[MetricRecord]) -> Result<Bytes>;
}

/// Output format chosen by the request `mode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Exposition,
    Json,
}

impl Format {
    /// `"json"` selects JSON; anything else, including absent, falls back
    /// to the exposition format.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            Some("json") => Format::Json,
            _ => Format::Exposition,
        }
    }

    pub fn serializer(self) -> &'static dyn Serializer {
        static EXPOSITION: ExpositionSerializer = ExpositionSerializer;
        static JSON: JsonSerializer = JsonSerializer;
        match self {
            Format::Exposition => &EXPOSITION,
            Format::Json => &JSON,
        }
    }
}
