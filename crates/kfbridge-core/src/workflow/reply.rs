//! Reply text extraction from a workflow output mapping.

use serde_json::{Map, Value};

/// Output keys checked for the reply, in priority order.
pub const REPLY_KEYS: [&str; 4] = ["result", "answer", "response", "content"];

/// Pick the user-facing reply out of a workflow output mapping.
///
/// The first key in [`REPLY_KEYS`] holding a non-blank value wins: strings
/// are returned as-is, anything else is serialized as JSON. Null, `false`,
/// zero and the empty string count as blank. When none match, the whole
/// mapping is serialized.
pub fn extract_reply(output: &Map<String, Value>) -> String {
    for key in REPLY_KEYS {
        match output.get(key) {
            Some(value) if is_blank(value) => continue,
            Some(Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => continue,
        }
    }
    Value::Object(output.clone()).to_string()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}
