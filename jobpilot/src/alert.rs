//! Operator alerts for backend failures.
//!
//! Every failure is logged. While alerts are not muted, the operator is also
//! asked through a [`ConfirmSink`] and may pause further prompts for the
//! rest of the process.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{error, info};

/// Option that mutes future alerts.
pub const PAUSE_ALERTS: &str = "Pause AI error alerts";
/// Option that acknowledges a single alert.
pub const CONTINUE: &str = "Okay Continue";
/// Title used for backend failure alerts.
pub const ALERT_TITLE: &str = "AI Connection Error";

/// Troubleshooting steps shown with every alert.
pub const API_CHECK_INSTRUCTIONS: &str = "

1. Make sure your AI API connection details like url, key, model names, etc are correct.
2. If you're using an local LLM, please check if the server is running.
3. Check if appropriate LLM and Embedding models are loaded and running.

Check the `[ai]` section of your config file or the LLM_* environment variables.

ERROR:
";

/// Something that can ask a human to pick one of several options.
#[async_trait]
pub trait ConfirmSink: Send + Sync {
    /// Show `message` under `title` and return the chosen option.
    async fn confirm(&self, message: &str, title: &str, options: &[&str]) -> String;
}

/// Sink that never prompts and always picks the last option.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

#[async_trait]
impl ConfirmSink for SilentSink {
    async fn confirm(&self, _message: &str, _title: &str, options: &[&str]) -> String {
        options.last().map_or_else(String::new, |o| (*o).to_owned())
    }
}

/// Alert state owned by a session.
pub struct AlertGate {
    sink: Arc<dyn ConfirmSink>,
    muted: AtomicBool,
}

impl AlertGate {
    /// Create a gate. `show_alerts = false` starts muted.
    #[must_use]
    pub fn new(sink: Arc<dyn ConfirmSink>, show_alerts: bool) -> Self {
        Self {
            sink,
            muted: AtomicBool::new(!show_alerts),
        }
    }

    /// A gate that only logs.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Arc::new(SilentSink), false)
    }

    /// Whether prompts are paused.
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Pause prompts for the rest of the process.
    pub fn mute(&self) {
        if !self.muted.swap(true, Ordering::SeqCst) {
            info!("AI error alerts paused");
        }
    }

    /// Log `err` and, unless muted, ask the operator about it.
    pub async fn report(&self, context: &str, err: &(dyn std::error::Error + Send + Sync)) {
        error!(error = %err, "{context}");
        if self.is_muted() {
            return;
        }

        let message = format!("{context} {API_CHECK_INSTRUCTIONS}{err}\n");
        let choice = self
            .sink
            .confirm(&message, ALERT_TITLE, &[PAUSE_ALERTS, CONTINUE])
            .await;
        if choice == PAUSE_ALERTS {
            self.mute();
        }
    }
}

impl fmt::Debug for AlertGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertGate")
            .field("muted", &self.is_muted())
            .finish_non_exhaustive()
    }
}
