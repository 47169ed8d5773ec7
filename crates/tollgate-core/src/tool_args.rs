// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool-call argument normalization shared by every provider adapter.
//!
//! Backends deliver arguments either as a JSON object or as a JSON-encoded
//! string. Both collapse to the same object map here.

use serde_json::{Map, Value};
use tracing::warn;

/// Normalize raw tool-call arguments into an object map.
///
/// - objects pass through unchanged
/// - strings are parsed as JSON; an object result is used as-is
/// - empty strings and `null` become an empty map
/// - anything unparseable or non-object is preserved under `_raw`
pub fn normalize_arguments(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        Value::String(s) => parse_argument_string(s),
        other => wrap_raw(other.clone(), None),
    }
}

fn parse_argument_string(s: &str) -> Map<String, Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(other) => wrap_raw(other, None),
        Err(e) => {
            warn!(error = %e, raw = %trimmed, "tool arguments are not valid JSON");
            wrap_raw(Value::String(trimmed.to_string()), Some(e.to_string()))
        }
    }
}

fn wrap_raw(raw: Value, parse_error: Option<String>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("_raw".to_string(), raw);
    if let Some(e) = parse_error {
        map.insert("_parse_error".to_string(), Value::String(e));
    }
    map
}
