//! Backend connection lifecycle.
//!
//! A [`Connection`] is created once per run, owned by its caller, and closed
//! exactly once. Model discovery during creation is advisory: many
//! OpenAI-compatible servers have no `/models` endpoint, so a failed listing
//! only produces a warning.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityPolicy, ModelCapabilities};
use crate::config::AiConfig;
use crate::error::{BackendError, ConfigError, Error, Result};
use crate::invoke::CallOptions;
use crate::wire::{ModelList, check_in_band, status_error};

/// Handle to a chat-completions backend.
#[derive(Debug)]
pub struct Connection {
    pub(crate) config: Arc<AiConfig>,
    pub(crate) policy: Arc<CapabilityPolicy>,
    pub(crate) client: Client,
    closed: AtomicBool,
}

impl Connection {
    /// Build a connection without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns a config error if `config` fails validation, or a backend
    /// error if the HTTP client cannot be constructed.
    pub fn new(config: AiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            policy: Arc::new(CapabilityPolicy::default()),
            client,
            closed: AtomicBool::new(false),
        })
    }

    /// Build a connection and check the configured model against the
    /// backend's model list.
    ///
    /// The listing runs under `options`. Listing failures, timeouts
    /// included, are logged and ignored. A listing that succeeds but does not
    /// mention the model (even as a case-insensitive substring in either
    /// direction) is also only a warning.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, on cancellation, or when the backend
    /// reports that no models at all are available.
    pub async fn create(config: AiConfig, options: &CallOptions) -> Result<Self> {
        info!("creating backend connection");
        let conn = Self::new(config)?;

        match conn.list_models(options).await {
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    error = %e,
                    "could not retrieve models list; this is normal for some OpenAI-compatible APIs"
                );
                warn!(model = %conn.model(), "will attempt to use the model directly");
            }
            Ok(models) if models.is_empty() => {
                return Err(ConfigError::invalid("No models are available!").into());
            }
            Ok(models) => {
                if !model_listed(conn.model(), &models) {
                    warn!(model = %conn.model(), available = ?models, "model not found in available models list");
                    warn!("will attempt to use the model anyway; OpenAI-compatible APIs often report names differently");
                }
            }
        }

        info!(
            url = %conn.base_url(),
            model = %conn.model(),
            family = %conn.config.backend_family,
            "backend connection ready"
        );
        Ok(conn)
    }

    /// Replace the capability policy used for this connection's model.
    #[must_use]
    pub fn with_policy(mut self, policy: CapabilityPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// The configuration this connection was built from.
    #[must_use]
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// The base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// The resolved model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model_id
    }

    /// Whether calls stream unless told otherwise.
    #[must_use]
    pub fn streaming_default(&self) -> bool {
        self.config.streaming_default
    }

    /// Capabilities believed available for the configured model.
    #[must_use]
    pub fn capabilities(&self) -> ModelCapabilities {
        self.policy.capabilities(self.model())
    }

    /// Whether [`Connection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the connection.
    ///
    /// Later calls are no-ops, and nothing here can fail the caller.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("backend connection already closed");
            return;
        }
        info!(url = %self.base_url(), "closing backend connection");
    }

    /// List the model identifiers advertised by the backend.
    ///
    /// # Errors
    ///
    /// Fails on cancellation, timeouts, transport errors, non-success
    /// statuses, in-band errors, and bodies without a `data` array.
    pub async fn list_models(&self, options: &CallOptions) -> Result<Vec<String>> {
        self.ensure_open()?;
        debug!("fetching models list");
        let ids = self.guard(options, self.fetch_models()).await?;
        debug!(models = ?ids, "available models");
        Ok(ids)
    }

    async fn fetch_models(&self) -> std::result::Result<Vec<String>, BackendError> {
        let response = self
            .client
            .get(self.models_url())
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        let list: ModelList = serde_json::from_str(&body)
            .map_err(|e| BackendError::response_format(format!("models list: {e}")))?;
        check_in_band(list.error.as_ref())?;

        Ok(list
            .data
            .ok_or_else(|| BackendError::response_format("No model data found in response."))?
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    /// Run `call` under the deadline and cancellation token of `options`.
    ///
    /// Cancellation wins over a result that is ready at the same time.
    pub(crate) async fn guard<T, F>(&self, options: &CallOptions, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, BackendError>>,
    {
        let deadline = options.timeout.unwrap_or_else(|| self.config.timeout());
        tokio::select! {
            biased;
            () = options.cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(deadline, call) => match outcome {
                Ok(result) => Ok(result?),
                Err(_) => Err(BackendError::timeout(deadline).into()),
            },
        }
    }

    pub(crate) fn ensure_open(&self) -> std::result::Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::internal("Connection is closed"));
        }
        Ok(())
    }

    pub(crate) fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url())
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url())
    }
}

fn model_listed(model: &str, available: &[String]) -> bool {
    let wanted = model.to_lowercase();
    available.iter().any(|id| {
        let id = id.to_lowercase();
        id == wanted || id.contains(&wanted) || wanted.contains(&id)
    })
}
