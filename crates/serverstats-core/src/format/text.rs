//! Exposition text format.
//!
//! Consecutive records with the same name share one `# TYPE <name> <kind>`
//! line. Samples are `<name>{<labels>} <value>`; braces are dropped when a
//! record has no labels. Lines are joined with `\n` and the body ends with a
//! literal `# EOF` line.

use std::fmt::Write;

use bytes::Bytes;

use crate::error::{Result, StatsError};
use crate::labels::write_labels;
use crate::record::MetricRecord;

use super::Serializer;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpositionSerializer;

impl ExpositionSerializer {
    pub fn render_string(&self, records: &[MetricRecord]) -> Result<String> {
        let mut out = String::with_capacity(records.len() * 96);
        let mut current: Option<&str> = None;

        for r in records {
            if current != Some(r.name) {
                writeln!(out, "# TYPE {} {}", r.name, r.kind.as_str()).map_err(fmt_err)?;
                current = Some(r.name);
            }

            out.push_str(r.name);
            if !r.labels.is_empty() || r.extra.is_some() {
                out.push('{');
                write_labels(&mut out, &r.labels, r.extra_pair()).map_err(fmt_err)?;
                out.push('}');
            }
            writeln!(out, " {}", r.value).map_err(fmt_err)?;
        }

        out.push_str("# EOF");
        Ok(out)
    }
}

fn fmt_err(e: std::fmt::Error) -> StatsError {
    StatsError::Internal(format!("render exposition: {e}"))
}

impl Serializer for ExpositionSerializer {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    fn render(&self, records: &[MetricRecord]) -> Result<Bytes> {
        self.render_string(records).map(Bytes::from)
    }
}
