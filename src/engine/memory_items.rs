//! Content representation (§4.2.5): entry content on the wire is an
//! opaque JSON array. The engine parses it once per sync to run the
//! prefix/divergence test; it never interprets an item's fields.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Parses `content` as a JSON array of opaque items.
///
/// `serde_json::Value`'s `PartialEq` already compares objects by key/value
/// rather than by serialized byte order, so comparing parsed arrays
/// directly gives the structural equality §4.2.4 and §9 require,
/// independent of whitespace or key ordering in the stored bytes.
pub fn parse(content: &str) -> CoreResult<Vec<Value>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| CoreError::validation("content", format!("invalid content JSON: {e}")))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(CoreError::validation("content", "content must be a JSON array")),
    }
}

pub fn encode(items: &[Value]) -> String {
    serde_json::to_string(&Value::Array(items.to_vec())).expect("array of values always serializes")
}

/// Whether `existing` is a strict (non-equal), non-empty prefix of
/// `incoming`. Empty `existing` is excluded so first-write/auto-create
/// (empty existing, non-empty incoming) falls through to the divergence
/// branch in `decide_sync`, which is the one that bumps the epoch (§4.2.4).
pub fn is_strict_prefix(existing: &[Value], incoming: &[Value]) -> bool {
    !existing.is_empty() && existing.len() < incoming.len() && incoming[..existing.len()] == *existing
}

/// Extracts a short title hint from the first item of a content array, for
/// conversation title inference on auto-create (§4.2.3). Items are opaque
/// to the engine in general, but title inference is the one place that
/// looks for a conventional `text` (or `content`) string field, falling
/// back to the item's raw JSON when neither is present.
pub fn first_text_hint(items: &[Value]) -> Option<String> {
    let first = items.first()?;
    let text = match first {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string()),
        other => other.to_string(),
    };
    Some(text)
}
