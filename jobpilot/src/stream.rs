//! Streamed completion assembly.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

use crate::error::BackendError;
use crate::wire::{ChatCompletionChunk, check_in_band};

/// Terminal data line of an OpenAI event stream.
const DONE_MARKER: &str = "[DONE]";

/// Accumulates streamed fragments into the final text.
#[derive(Debug, Default)]
pub struct TextAccumulator {
    text: String,
    chunks: usize,
    done: bool,
}

impl TextAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the `data` of one server-sent event.
    ///
    /// Every chunk is checked for an embedded error payload. A chunk with no
    /// delta content contributes nothing but is still counted.
    ///
    /// # Errors
    ///
    /// Returns an in-band error if the chunk carries one, or a stream error
    /// if the data is not a JSON chunk.
    pub fn push_event(&mut self, data: &str) -> Result<(), BackendError> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }
        if data == DONE_MARKER {
            self.done = true;
            return Ok(());
        }

        let chunk: ChatCompletionChunk = serde_json::from_str(data)
            .map_err(|e| BackendError::stream(format!("invalid stream chunk: {e}, data: {data}")))?;
        check_in_band(chunk.error.as_ref())?;

        self.chunks += 1;
        if let Some(content) = chunk.content() {
            tracing::debug!(fragment = content, "stream chunk");
            self.text.push_str(content);
        }
        Ok(())
    }

    /// Number of JSON chunks received so far.
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Whether the `[DONE]` marker was seen.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// The text assembled so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the accumulator, returning the assembled text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Drain a byte stream of server-sent events into the concatenated content.
///
/// # Errors
///
/// Fails on transport errors, malformed events, and in-band error payloads.
pub async fn collect_text<S, B, E>(bytes: S) -> Result<String, BackendError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(bytes.eventsource());
    let mut acc = TextAccumulator::new();

    tracing::info!("streaming started");
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| BackendError::stream(e.to_string()))?;
        acc.push_event(&event.data)?;
        if acc.is_done() {
            break;
        }
    }
    tracing::info!(chunks = acc.chunk_count(), "streaming complete");

    Ok(acc.into_text())
}
