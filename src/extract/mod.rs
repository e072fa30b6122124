//! Operation name extraction from raw request bytes.
//!
//! The default matcher is textual: it looks for `"operationName": "<name>"`
//! anywhere in the body and does not parse JSON. A key with that spelling
//! inside an unrelated string value (a variable, an escaped query) matches
//! too. The structural mode parses the body first and only falls back to the
//! textual match when that finds nothing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// How operation names are pulled out of request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// Regex over the body text.
    #[default]
    Textual,
    /// Top-level JSON field, then textual fallback.
    Structural,
}

fn operation_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""operationName"\s*:\s*"([^"]+)""#).expect("operationName pattern is valid")
    })
}

/// Best-effort operation name of a GraphQL request.
///
/// `body_offset` is where the body starts inside `raw`. Returns an empty
/// string when there is no match or the offset lies past the buffer.
pub fn extract_operation_name(raw: &[u8], body_offset: usize) -> String {
    match raw.get(body_offset..) {
        Some(body) => textual(body),
        None => String::new(),
    }
}

/// Same as [`extract_operation_name`] with an explicit mode.
pub fn extract_with_mode(raw: &[u8], body_offset: usize, mode: ExtractMode) -> String {
    let Some(body) = raw.get(body_offset..) else {
        return String::new();
    };
    match mode {
        ExtractMode::Textual => textual(body),
        ExtractMode::Structural => structural(body).unwrap_or_else(|| textual(body)),
    }
}

fn textual(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    operation_name_pattern()
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn structural(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value {
        Value::Object(_) => named(&value),
        // Batched requests: first operation that carries a name.
        Value::Array(items) => items.iter().find_map(named),
        _ => None,
    }
}

fn named(value: &Value) -> Option<String> {
    value
        .get("operationName")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
