//! Ordered label sets and label value escaping.
//!
//! A [`LabelSet`] keeps insertion order. [`LabelSet::with_service`] moves the
//! `service` label to the end, so every series reads
//! `<base labels...>,service="<name>"` regardless of configuration order.
//! Escaping lives here once and is applied to every label value the
//! exposition format writes, including per-record discriminators.

use std::borrow::Cow;
use std::fmt::{self, Write};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the label identifying the exporting service.
pub const SERVICE_LABEL: &str = "service";

/// Ordered `name -> value` label mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, keeping its position if it already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Append the lower-cased `service` label last, replacing any earlier one.
    pub fn with_service(mut self, service: &str) -> Self {
        self.pairs.retain(|(k, _)| k != SERVICE_LABEL);
        self.pairs
            .push((SERVICE_LABEL.to_string(), service.to_lowercase()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl Serialize for LabelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = LabelSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label name to string value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut set = LabelSet::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    set.insert(k, v);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Helper to escape label values (`\`, `"` and newline).
pub fn escape_label_value(v: &str) -> Cow<'_, str> {
    if !v.contains(['\\', '"', '\n']) {
        return Cow::Borrowed(v);
    }
    let mut out = String::with_capacity(v.len() + 4);
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Write `name="value",...` for `labels` followed by the optional `extra`
/// pair. Writes nothing when both are empty.
pub fn write_labels(
    out: &mut impl Write,
    labels: &LabelSet,
    extra: Option<(&str, &str)>,
) -> fmt::Result {
    let mut first = true;
    for (k, v) in labels.iter().chain(extra) {
        if !first {
            out.write_char(',')?;
        }
        first = false;
        write!(out, "{}=\"{}\"", k, escape_label_value(v))?;
    }
    Ok(())
}

/// True when `name` is a valid exposition label name.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
