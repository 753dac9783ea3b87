//! Chat-completions request and response bodies.
//!
//! These map onto the OpenAI protocol family. Response types are lenient:
//! compatible servers omit fields freely, so every field is optional and
//! shape checks happen in the invoker.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::BackendError;
use crate::message::Message;

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<&'a ResponseFormat>,
}

/// Structured-output directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Any syntactically valid JSON object.
    JsonObject,
    /// Output constrained to a declared schema.
    JsonSchema { json_schema: Value },
}

impl ResponseFormat {
    /// Build a `json_schema` directive.
    #[must_use]
    pub fn json_schema(name: &str, schema: Value, strict: bool) -> Self {
        Self::JsonSchema {
            json_schema: json!({
                "name": name,
                "schema": schema,
                "strict": strict,
            }),
        }
    }
}

/// Non-streaming response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// A choice in a non-streaming response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

/// Assistant message in a non-streaming response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One streamed `chat.completion.chunk`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// A choice inside a streamed chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

/// Incremental content of a streamed choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Content of the first choice's delta, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_deref())
    }
}

/// `GET /models` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Option<Vec<ModelEntry>>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// A model advertised by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    error: Value,
}

/// Turn an embedded `error` field into a [`BackendError`].
///
/// Null, `false`, empty strings and empty containers count as "no error",
/// since some servers always send the field.
pub fn check_in_band(error: Option<&Value>) -> Result<(), BackendError> {
    let Some(payload) = error else {
        return Ok(());
    };
    let present = match payload {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    };
    if !present {
        return Ok(());
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| payload.to_string(), str::to_owned);
    let err = BackendError::in_band(message);
    Err(match payload.get("code").and_then(value_as_code) {
        Some(code) => err.with_code(code),
        None => err,
    })
}

/// Build the error for a non-success HTTP status.
pub fn status_error(status: u16, body: &str) -> BackendError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return BackendError::http_status(status, body.trim());
    };
    let message = envelope
        .error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| envelope.error.to_string(), str::to_owned);
    let err = BackendError::http_status(status, message);
    match envelope.error.get("code").and_then(value_as_code) {
        Some(code) => err.with_code(code),
        None => err,
    }
}

fn value_as_code(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
