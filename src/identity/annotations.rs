//! Annotation extraction from raw object snapshots.
//!
//! Absent metadata or annotations are a normal prior state (object
//! creation) and yield an empty mapping. Only a payload that is not JSON at
//! all, or not a JSON object, is an error.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Extract `metadata.annotations` from a serialized object.
///
/// Every value is returned in textual form regardless of its JSON type, so
/// `{"n": 5}` reads back as `"5"`.
pub fn extract(raw: &[u8]) -> Result<BTreeMap<String, String>> {
    let object = parse_object(raw)?;

    let annotations = match object.get("metadata").and_then(|m| m.get("annotations")) {
        Some(Value::Object(map)) => map,
        Some(other) => {
            debug!(kind = json_kind(other), "Annotations are not a mapping, treating as empty");
            return Ok(BTreeMap::new());
        }
        None => {
            debug!("No annotations found in the object");
            return Ok(BTreeMap::new());
        }
    };

    Ok(annotations
        .iter()
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect())
}

/// Extract a single annotation by key. A missing key is `Ok(None)`.
pub fn extract_value(raw: &[u8], key: &str) -> Result<Option<String>> {
    let value = extract(raw)?.remove(key);
    if value.is_none() {
        debug!(annotation = key, "Annotation not found in the object");
    }
    Ok(value)
}

fn parse_object(raw: &[u8]) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| Error::MalformedInput(format!("object snapshot is not valid JSON: {}", e)))?;

    match value {
        Value::Object(object) => Ok(object),
        other => Err(Error::Extraction(format!(
            "object snapshot is a JSON {}, expected an object",
            json_kind(&other)
        ))),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
