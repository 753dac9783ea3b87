//! Single completion calls.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{BackendError, Result};
use crate::message::Message;
use crate::normalize::normalize;
use crate::stream::collect_text;
use crate::wire::{ChatCompletionRequest, ChatCompletionResponse, ResponseFormat, check_in_band, status_error};

/// Parameters of one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The single-turn conversation to send.
    pub messages: Vec<Message>,
    /// Structured-output directive; `None` for free text.
    pub response_format: Option<ResponseFormat>,
    /// Sampling temperature, sent only to models known to accept it.
    pub temperature: f32,
    /// Stream the reply; `None` uses the connection default.
    pub stream: Option<bool>,
}

impl CompletionRequest {
    /// A request with the given messages, no directive, temperature 0.
    #[must_use]
    pub const fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            response_format: None,
            temperature: 0.0,
            stream: None,
        }
    }

    /// A request holding one user message.
    #[must_use]
    pub fn user(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::user(prompt)])
    }

    /// Ask for structured output.
    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Force streaming on or off.
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }
}

/// Outcome of a completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    /// Output of a structured request, parsed into JSON. May be the
    /// parse-failure sentinel (see [`crate::normalize::is_sentinel`]).
    Structured(Value),
    /// Free-text output.
    Text(String),
}

impl CompletionResult {
    /// The result as JSON, parsing free text on the way.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::Text(text) => normalize(&text),
        }
    }

    /// The free text, if this is a text result.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }
}

/// Per-call deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Cancels the in-flight call when triggered.
    pub cancel: CancellationToken,
    /// Overrides the connection's configured deadline. The HTTP client
    /// enforces the configured deadline too, so only shorter values bite.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Options bound to an existing cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            timeout: None,
        }
    }

    /// Override the deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Connection {
    /// Issue one completion call.
    ///
    /// `temperature` is sent only when the capability policy allows it for
    /// this model, and `response_format` only when the backend family
    /// speaks the OpenAI response-format dialect. Whenever a directive was
    /// requested, the text is parsed into JSON before returning; unparseable
    /// text becomes the sentinel rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] when the token fires, and
    /// [`crate::Error::Backend`] for timeouts, transport failures, non-success
    /// statuses, in-band error payloads, and malformed responses.
    pub async fn invoke(&self, request: &CompletionRequest, options: &CallOptions) -> Result<CompletionResult> {
        self.ensure_open()?;

        let stream = request.stream.unwrap_or(self.config.streaming_default);
        let body = ChatCompletionRequest {
            model: self.model(),
            messages: &request.messages,
            stream,
            temperature: self
                .policy
                .supports_temperature(self.model())
                .then_some(request.temperature),
            response_format: request
                .response_format
                .as_ref()
                .filter(|_| self.config.backend_family.accepts_response_format()),
        };
        debug!(model = %body.model, stream, directive = body.response_format.is_some(), "sending completion request");

        let call = async {
            if stream {
                self.send_streaming(&body).await
            } else {
                self.send_batch(&body).await
            }
        };

        let text = self.guard(options, call).await?;

        let result = if request.response_format.is_some() {
            CompletionResult::Structured(normalize(&text))
        } else {
            CompletionResult::Text(text)
        };
        info!(answer = ?result, "backend answered");
        Ok(result)
    }

    async fn send_batch(&self, body: &ChatCompletionRequest<'_>) -> std::result::Result<String, BackendError> {
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::response_format(format!("parse error: {e}, response: {text}")))?;
        check_in_band(parsed.error.as_ref())?;

        let choice = parsed
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or_else(|| BackendError::response_format("No choices found in response."))?;
        let message = choice.message.ok_or_else(|| {
            BackendError::response_format("The response does not contain the expected structure.")
        })?;

        Ok(message.content.unwrap_or_default())
    }

    async fn send_streaming(&self, body: &ChatCompletionRequest<'_>) -> std::result::Result<String, BackendError> {
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(status_error(status.as_u16(), &text));
        }

        collect_text(response.bytes_stream()).await
    }
}
