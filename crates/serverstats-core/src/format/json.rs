//! JSON format: `{ "<metric>": [ { "labels": {...}, "<extra>": "...", "value": n } ] }`.
//!
//! Top-level keys keep record order (serde_json `preserve_order`).

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{Result, StatsError};
use crate::record::MetricRecord;

use super::Serializer;

pub const CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn to_value(&self, records: &[MetricRecord]) -> Result<Value> {
        let mut doc = Map::new();

        for r in records {
            let labels = serde_json::to_value(&*r.labels).map_err(json_err)?;
            let value = serde_json::to_value(r.value).map_err(json_err)?;

            let mut obs = Map::new();
            obs.insert("labels".into(), labels);
            if let Some((name, extra)) = r.extra_pair() {
                obs.insert(name.into(), Value::String(extra.to_string()));
            }
            obs.insert("value".into(), value);

            match doc.entry(r.name).or_insert_with(|| Value::Array(Vec::new())) {
                Value::Array(list) => list.push(Value::Object(obs)),
                _ => {
                    return Err(StatsError::Internal(format!(
                        "json metric slot {} is not a list",
                        r.name
                    )))
                }
            }
        }

        Ok(Value::Object(doc))
    }
}

fn json_err(e: serde_json::Error) -> StatsError {
    StatsError::Internal(format!("render json: {e}"))
}

impl Serializer for JsonSerializer {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    fn render(&self, records: &[MetricRecord]) -> Result<Bytes> {
        let doc = self.to_value(records)?;
        serde_json::to_vec(&doc).map(Bytes::from).map_err(json_err)
    }
}
