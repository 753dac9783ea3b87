//! Error types for the answer pipeline.
//!
//! The hierarchy mirrors the three failure families of the pipeline:
//! - [`ConfigError`]: missing or invalid connection parameters
//! - [`BackendError`]: transport failures and malformed or error-carrying responses
//! - unparseable model output, which is never an error (see [`crate::normalize`])

use std::fmt;
use std::time::Duration;

/// Result type alias for jobpilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Connection parameters are missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The backend failed or answered with something unusable.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The call was cancelled through its cancellation token.
    #[error("Request was cancelled")]
    Cancelled,

    /// The operation has no implementation yet.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// JSON serialization error while building a request.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an unsupported-operation error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }

    /// Returns the backend error, if this is one.
    #[must_use]
    pub const fn as_backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Error raised while validating connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// AI usage is switched off.
    #[error("AI is not enabled. Set `USE_AI=true` or `ai_enabled = true` under `[ai]` to use it.")]
    Disabled,
    /// A required field is empty or absent.
    #[error("missing required config: {0}")]
    MissingField(String),
    /// A field holds a value that cannot be used.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

impl ConfigError {
    /// Create a missing-field error.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}

/// Error reported by, or while talking to, the chat-completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct BackendError {
    /// The error kind.
    pub kind: BackendErrorKind,
    /// Human-readable description, including any backend-provided text.
    pub message: String,
    /// HTTP status, when the failure came with one.
    pub status: Option<u16>,
    /// Optional error code from the backend.
    pub code: Option<String>,
}

/// Categories of backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum BackendErrorKind {
    /// Network or connection failure.
    Network,
    /// The call exceeded its deadline.
    Timeout,
    /// Non-success HTTP status.
    HttpStatus,
    /// The backend embedded an `error` payload in an otherwise normal body.
    InBand,
    /// The response did not have the expected shape.
    ResponseFormat,
    /// The event stream broke mid-way.
    Stream,
    /// Client-side failure (e.g. building the HTTP client).
    Internal,
}

impl BackendError {
    fn with_kind(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::with_kind(BackendErrorKind::Network, message)
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::with_kind(
            BackendErrorKind::Timeout,
            format!("Request timed out after {after:?}"),
        )
    }

    /// Create an HTTP status error carrying the backend's error text.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::HttpStatus,
            message: format!("Error code: {status} - {}", body.into()),
            status: Some(status),
            code: None,
        }
    }

    /// Create an error for an `error` payload found inside a response.
    #[must_use]
    pub fn in_band(payload: impl fmt::Display) -> Self {
        Self::with_kind(
            BackendErrorKind::InBand,
            format!("Error occurred with API: \"{payload}\""),
        )
    }

    /// Create a response shape error.
    #[must_use]
    pub fn response_format(detail: impl Into<String>) -> Self {
        Self::with_kind(
            BackendErrorKind::ResponseFormat,
            format!("Unexpected response format from API. {}", detail.into()),
        )
    }

    /// Create a streaming error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::with_kind(BackendErrorKind::Stream, message)
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(BackendErrorKind::Internal, message)
    }

    /// Attach a backend error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the failure text came from the backend rather than the transport.
    #[must_use]
    pub const fn is_backend_reported(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::HttpStatus
                | BackendErrorKind::InBand
                | BackendErrorKind::ResponseFormat
        )
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::with_kind(BackendErrorKind::Timeout, "Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.into())
    }
}
