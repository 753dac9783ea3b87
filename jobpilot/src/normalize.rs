//! Conversion of raw model text into JSON.
//!
//! Parsing never fails: text that is not valid JSON becomes the sentinel
//! `{"error": "Unable to parse the response as JSON", "data": <text>}`, and
//! callers branch on [`is_sentinel`] instead of handling an error.

use serde_json::{Value, json};

/// Message stored under `error` in the sentinel value.
pub const PARSE_FAILURE: &str = "Unable to parse the response as JSON";

/// Parse `text` as JSON, or wrap it in the sentinel.
#[must_use]
pub fn normalize(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "model output is not valid JSON");
        sentinel(text)
    })
}

/// Build the sentinel for unparseable `text`.
#[must_use]
pub fn sentinel(text: &str) -> Value {
    json!({ "error": PARSE_FAILURE, "data": text })
}

/// Whether `value` is the parse-failure sentinel.
#[must_use]
pub fn is_sentinel(value: &Value) -> bool {
    value.get("error").and_then(Value::as_str) == Some(PARSE_FAILURE)
}
