//! In-memory metric records shared by both output formats.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::labels::LabelSet;

/// Declared metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Sample value. Integers stay integers on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) if v.is_nan() => f.write_str("NaN"),
            MetricValue::Float(v) if v.is_infinite() => {
                f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" })
            }
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            MetricValue::Int(v) => serializer.serialize_i64(v),
            MetricValue::Float(v) => serializer.serialize_f64(v),
        }
    }
}

/// Per-record discriminator label (`version`, `worker_id`, `class_name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraLabel {
    pub name: &'static str,
    pub value: String,
}

/// One sample, ready for a serializer.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: &'static str,
    pub kind: MetricKind,
    pub labels: Arc<LabelSet>,
    pub extra: Option<ExtraLabel>,
    pub value: MetricValue,
}

impl MetricRecord {
    pub fn extra_pair(&self) -> Option<(&str, &str)> {
        self.extra.as_ref().map(|e| (e.name, e.value.as_str()))
    }
}
