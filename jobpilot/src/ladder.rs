//! Structured-output fallback ladder.
//!
//! A structured request is tried with the strongest output constraint the
//! model is believed to support, then with progressively weaker ones:
//!
//! ```text
//! SchemaConstrained -> ObjectConstrained -> PlainTextInstructed
//! ```
//!
//! A step is abandoned only when its failure looks like "this output format
//! is not supported". Backends describe that in free text, so the decision
//! matches known substrings of backend-reported error messages. Transport
//! failures, timeouts and cancellation are never treated as format problems.

use serde_json::Value;
use tracing::{info, warn};

use crate::capability::ModelCapabilities;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::invoke::{CallOptions, CompletionRequest};
use crate::message::Message;
use crate::wire::ResponseFormat;

/// Instruction appended to the prompt once no output constraint is requested.
pub const JSON_ONLY_INSTRUCTION: &str = "\n\nIMPORTANT: Respond with ONLY a valid JSON object in the exact format specified above. Do not include any markdown formatting, explanations, or additional text.";

/// How a structured request is phrased to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// `response_format: json_schema` with the declared schema.
    SchemaConstrained,
    /// `response_format: json_object`.
    ObjectConstrained,
    /// No directive; the prompt asks for bare JSON.
    PlainTextInstructed,
}

impl Strategy {
    /// First rung for a model with the given capabilities.
    #[must_use]
    pub const fn entry(capabilities: ModelCapabilities) -> Self {
        if capabilities.supports_structured_schema {
            Self::SchemaConstrained
        } else {
            Self::ObjectConstrained
        }
    }

    /// The next weaker rung, or `None` at the bottom.
    #[must_use]
    pub const fn demote(self) -> Option<Self> {
        match self {
            Self::SchemaConstrained => Some(Self::ObjectConstrained),
            Self::ObjectConstrained => Some(Self::PlainTextInstructed),
            Self::PlainTextInstructed => None,
        }
    }

    /// Error substrings (lowercase) meaning "this rung's format is unsupported".
    #[must_use]
    pub const fn unsupported_markers(self) -> &'static [&'static str] {
        match self {
            Self::SchemaConstrained => &[
                "json_schema",
                "response_format",
                "400",
                "not supported",
                "invalid parameter",
            ],
            Self::ObjectConstrained => &[
                "json_object",
                "response_format",
                "400",
                "not supported",
                "invalid parameter",
            ],
            Self::PlainTextInstructed => &[],
        }
    }
}

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSignature {
    /// The backend rejected the requested output format.
    FormatUnsupported,
    /// Anything else; not retried.
    Other,
}

impl ErrorSignature {
    /// Classify `err` raised while running `strategy`.
    #[must_use]
    pub fn classify(err: &Error, strategy: Strategy) -> Self {
        let Some(backend) = err.as_backend().filter(|b| b.is_backend_reported()) else {
            return Self::Other;
        };
        let text = backend.to_string().to_lowercase();
        if strategy
            .unsupported_markers()
            .iter()
            .any(|marker| text.contains(marker))
        {
            Self::FormatUnsupported
        } else {
            Self::Other
        }
    }
}

/// JSON schema declared for schema-constrained requests.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Schema name reported to the backend.
    pub name: String,
    /// The JSON schema document.
    pub schema: Value,
    /// Ask the backend to enforce the schema strictly.
    pub strict: bool,
}

impl OutputSchema {
    /// Create a strict schema.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }
}

/// A question whose answer must be JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    /// Fully rendered prompt.
    pub prompt: String,
    /// Schema for the strongest rung.
    pub schema: OutputSchema,
    /// Stream the reply; `None` uses the connection default.
    pub stream: Option<bool>,
}

impl StructuredRequest {
    /// Create a request.
    #[must_use]
    pub fn new(prompt: impl Into<String>, schema: OutputSchema) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
            stream: None,
        }
    }

    /// Force streaming on or off.
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// The completion call issued at `strategy`.
    #[must_use]
    pub fn completion_for(&self, strategy: Strategy) -> CompletionRequest {
        let (prompt, format) = match strategy {
            Strategy::SchemaConstrained => (
                self.prompt.clone(),
                Some(ResponseFormat::json_schema(
                    &self.schema.name,
                    self.schema.schema.clone(),
                    self.schema.strict,
                )),
            ),
            Strategy::ObjectConstrained => (self.prompt.clone(), Some(ResponseFormat::JsonObject)),
            Strategy::PlainTextInstructed => (format!("{}{JSON_ONLY_INSTRUCTION}", self.prompt), None),
        };
        CompletionRequest {
            messages: vec![Message::user(prompt)],
            response_format: format,
            temperature: 0.0,
            stream: self.stream,
        }
    }
}

/// A structured answer and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The parsed answer, possibly the parse-failure sentinel.
    pub value: Value,
    /// The rung that produced it.
    pub strategy: Strategy,
    /// Every rung tried, in order.
    pub attempts: Vec<Strategy>,
}

impl Connection {
    /// Resolve `request` into JSON, walking down the fallback ladder.
    ///
    /// Each demotion sends a fresh request; the ladder never climbs back up.
    ///
    /// # Errors
    ///
    /// Propagates the first failure that is not a format rejection, and any
    /// failure of the final plain-text rung.
    pub async fn resolve_structured(&self, request: &StructuredRequest, options: &CallOptions) -> Result<Resolution> {
        let mut strategy = Strategy::entry(self.capabilities());
        let mut attempts = Vec::with_capacity(3);

        loop {
            attempts.push(strategy);
            info!(model = %self.model(), strategy = ?strategy, "requesting structured answer");

            let err = match self.invoke(&request.completion_for(strategy), options).await {
                Ok(result) => {
                    return Ok(Resolution {
                        value: result.into_value(),
                        strategy,
                        attempts,
                    });
                }
                Err(err) => err,
            };

            match (ErrorSignature::classify(&err, strategy), strategy.demote()) {
                (ErrorSignature::FormatUnsupported, Some(next)) => {
                    warn!(error = %err, from = ?strategy, to = ?next, "output format rejected, falling back");
                    strategy = next;
                }
                _ => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use serde_json::json;

    fn caps(schema: bool) -> ModelCapabilities {
        ModelCapabilities {
            supports_temperature: false,
            supports_structured_schema: schema,
        }
    }

    #[test]
    fn test_entry_rung() {
        assert_eq!(Strategy::entry(caps(true)), Strategy::SchemaConstrained);
        assert_eq!(Strategy::entry(caps(false)), Strategy::ObjectConstrained);
    }

    #[test]
    fn test_demotion_is_linear() {
        let mut seen = vec![Strategy::SchemaConstrained];
        while let Some(next) = seen.last().and_then(|s| s.demote()) {
            assert!(next > *seen.last().unwrap());
            seen.push(next);
        }
        assert_eq!(
            seen,
            vec![
                Strategy::SchemaConstrained,
                Strategy::ObjectConstrained,
                Strategy::PlainTextInstructed
            ]
        );
    }

    #[test]
    fn test_classify_format_errors() {
        let err: Error = BackendError::http_status(400, "bad request").into();
        assert_eq!(
            ErrorSignature::classify(&err, Strategy::SchemaConstrained),
            ErrorSignature::FormatUnsupported
        );

        let err: Error = BackendError::in_band("'json_schema' is Not Supported by this model").into();
        assert_eq!(
            ErrorSignature::classify(&err, Strategy::SchemaConstrained),
            ErrorSignature::FormatUnsupported
        );

        let err: Error = BackendError::http_status(422, "json_object mode unavailable").into();
        assert_eq!(
            ErrorSignature::classify(&err, Strategy::ObjectConstrained),
            ErrorSignature::FormatUnsupported
        );
        assert_eq!(
            ErrorSignature::classify(&err, Strategy::SchemaConstrained),
            ErrorSignature::Other
        );
    }

    #[test]
    fn test_classify_never_demotes_transport_or_plain() {
        let err: Error = BackendError::network("connection refused: response_format").into();
        assert_eq!(
            ErrorSignature::classify(&err, Strategy::SchemaConstrained),
            ErrorSignature::Other
        );
        assert_eq!(
            ErrorSignature::classify(&Error::Cancelled, Strategy::ObjectConstrained),
            ErrorSignature::Other
        );

        let err: Error = BackendError::http_status(400, "response_format not supported").into();
        assert_eq!(
            ErrorSignature::classify(&err, Strategy::PlainTextInstructed),
            ErrorSignature::Other
        );
    }

    #[test]
    fn test_completion_for_each_rung() {
        let request = StructuredRequest::new("List skills.", OutputSchema::new("skills", json!({"type": "object"})));

        let schema = request.completion_for(Strategy::SchemaConstrained);
        assert!(matches!(schema.response_format, Some(ResponseFormat::JsonSchema { .. })));
        assert_eq!(schema.messages[0].content, "List skills.");

        let object = request.completion_for(Strategy::ObjectConstrained);
        assert_eq!(object.response_format, Some(ResponseFormat::JsonObject));

        let plain = request.completion_for(Strategy::PlainTextInstructed);
        assert!(plain.response_format.is_none());
        assert!(plain.messages[0].content.starts_with("List skills."));
        assert!(plain.messages[0].content.ends_with("or additional text."));
    }
}
