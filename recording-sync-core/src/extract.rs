//! Resource extraction from untyped query responses.
//!
//! A query response is decoded into [`RawRecord`] (a `serde_json::Value` with
//! insertion-ordered objects) and walked depth-first. Every string-valued
//! locator field is paired with the identifier declared by the nearest
//! enclosing record.

use serde_json::Value;

/// Untyped nested value returned by the call data source.
pub type RawRecord = Value;

pub const DEFAULT_IDENTIFIER_KEY: &str = "callId";
pub const DEFAULT_LOCATOR_KEY: &str = "s3Url";

/// An (identifier, locator) pair found in a [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePair {
    /// Identifier inherited from the nearest declaring ancestor, if any.
    pub identifier: Option<String>,
    pub locator: String,
}

impl ResourcePair {
    pub fn new(identifier: Option<&str>, locator: &str) -> Self {
        Self {
            identifier: identifier.map(str::to_owned),
            locator: locator.to_owned(),
        }
    }
}

/// Walks nested records collecting [`ResourcePair`]s.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    identifier_key: String,
    locator_key: String,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_KEY, DEFAULT_LOCATOR_KEY)
    }
}

impl RecordExtractor {
    pub fn new(identifier_key: impl Into<String>, locator_key: impl Into<String>) -> Self {
        Self {
            identifier_key: identifier_key.into(),
            locator_key: locator_key.into(),
        }
    }

    /// Extract every pair in `value`, starting with no inherited identifier.
    pub fn extract(&self, value: &RawRecord) -> Vec<ResourcePair> {
        self.extract_from(value, None)
    }

    /// Extract every pair in `value`, with `inherited` as the identifier in
    /// effect at the root.
    pub fn extract_from(&self, value: &RawRecord, inherited: Option<&str>) -> Vec<ResourcePair> {
        let mut pairs = Vec::new();
        self.walk(value, inherited.map(str::to_owned), &mut pairs);
        tracing::debug!(pairs = pairs.len(), "Extracted resource pairs");
        pairs
    }

    fn walk(&self, value: &Value, current: Option<String>, out: &mut Vec<ResourcePair>) {
        match value {
            Value::Object(fields) => {
                // A declared identifier, even null, replaces the inherited one for this subtree.
                let current = match fields.get(&self.identifier_key) {
                    Some(declared) => identifier_text(declared),
                    None => current,
                };
                for (key, field) in fields {
                    match field {
                        Value::String(locator) if *key == self.locator_key => {
                            out.push(ResourcePair {
                                identifier: current.clone(),
                                locator: locator.clone(),
                            });
                        }
                        _ => self.walk(field, current.clone(), out),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item, current.clone(), out);
                }
            }
            _ => {}
        }
    }
}

/// Text form of a declared identifier. Zero, `false`, `null` and containers
/// count as no identifier.
pub fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some(true.to_string()),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// [`RecordExtractor::extract`] with the `callId` / `s3Url` keys.
pub fn extract_resource_pairs(value: &RawRecord) -> Vec<ResourcePair> {
    RecordExtractor::default().extract(value)
}
