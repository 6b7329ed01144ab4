//! Best-effort parsing of JSON emitted by a generative model.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("leading fence pattern"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("trailing fence pattern"));

/// Result of parsing model output. The fallback is a value, not an error:
/// callers decide whether an unparsed answer is usable.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Value),
    Unparsed { error: String, raw_text: String },
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    /// The parsed value, or `{"error": ..., "raw_text": ...}` for the fallback.
    pub fn to_value(&self) -> Value {
        match self {
            ParseOutcome::Parsed(v) => v.clone(),
            ParseOutcome::Unparsed { error, raw_text } => {
                let mut map = Map::new();
                map.insert("error".into(), Value::String(error.clone()));
                map.insert("raw_text".into(), Value::String(raw_text.clone()));
                Value::Object(map)
            }
        }
    }
}

/// Trim whitespace and drop a surrounding ```` ``` ```` / ```` ```json ```` fence.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_lead = LEADING_FENCE.replace(trimmed, "");
    TRAILING_FENCE.replace(&without_lead, "").trim().to_string()
}

/// Parse model text as JSON: first the fence-stripped text, then the
/// outermost `{...}` span inside it.
pub fn parse_structured(raw: &str) -> ParseOutcome {
    let clean = strip_code_fences(raw);

    let first_error = match serde_json::from_str::<Value>(&clean) {
        Ok(v) => return ParseOutcome::Parsed(v),
        Err(e) => e.to_string(),
    };

    if let (Some(start), Some(end)) = (clean.find('{'), clean.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<Value>(&clean[start..=end]) {
                tracing::debug!("Parsed model output from embedded object span");
                return ParseOutcome::Parsed(v);
            }
        }
    }

    tracing::warn!(error = %first_error, "Model output is not valid JSON");
    ParseOutcome::Unparsed {
        error: format!("Failed to parse JSON: {first_error}"),
        raw_text: clean,
    }
}

/// Flatten nested objects into dotted keys. Arrays and scalars are leaves;
/// a non-object root becomes a single `value` column.
pub fn flatten_object(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    match value {
        Value::Object(fields) => flatten_into(fields, None, &mut out),
        other => {
            out.insert("value".into(), other.clone());
        }
    }
    out
}

fn flatten_into(fields: &Map<String, Value>, prefix: Option<&str>, out: &mut Map<String, Value>) {
    for (key, value) in fields {
        let name = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_into(nested, Some(&name), out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}
