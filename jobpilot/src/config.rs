//! Backend connection configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Protocol family spoken by the configured backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendFamily {
    /// The official OpenAI API.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Any server speaking the OpenAI chat-completions protocol (Ollama, LM Studio, vLLM...).
    #[serde(rename = "openai-like")]
    OpenAiLike,
    /// DeepSeek's hosted API.
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Google Gemini through its OpenAI-compatible endpoint.
    #[serde(rename = "gemini")]
    Gemini,
}

impl BackendFamily {
    /// Returns the configuration name of the family.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenAiLike => "openai-like",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
        }
    }

    /// Whether requests may carry a `response_format` directive.
    #[must_use]
    pub const fn accepts_response_format(&self) -> bool {
        matches!(self, Self::OpenAi | Self::OpenAiLike)
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openai-like" | "openai_like" => Ok(Self::OpenAiLike),
            "deepseek" => Ok(Self::DeepSeek),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::invalid(format!(
                "unknown backend family \"{other}\", expected one of: openai, openai-like, deepseek, gemini"
            ))),
        }
    }
}

/// Configuration for a backend connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    /// Whether AI-backed answering is switched on at all.
    #[serde(default)]
    pub ai_enabled: bool,
    /// Base URL of the chat-completions API, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub endpoint_url: String,
    /// Model identifier sent with every request.
    #[serde(default)]
    pub model_id: String,
    /// API key; local servers accept any placeholder.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Protocol family of the backend.
    #[serde(default)]
    pub backend_family: BackendFamily,
    /// Stream completions unless a call says otherwise.
    #[serde(default)]
    pub streaming_default: bool,
    /// Per-call deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key() -> String {
    AiConfig::PLACEHOLDER_API_KEY.to_owned()
}

const fn default_timeout_secs() -> u64 {
    AiConfig::DEFAULT_TIMEOUT_SECS
}

impl AiConfig {
    /// Default OpenAI API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    /// Key used for backends that do not authenticate.
    pub const PLACEHOLDER_API_KEY: &'static str = "not-needed";
    /// Default per-call deadline.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
    /// Models accepted by the DeepSeek API.
    pub const DEEPSEEK_MODELS: &'static [&'static str] = &["deepseek-chat", "deepseek-reasoner"];

    /// Creates an enabled configuration for the given endpoint and model.
    #[must_use]
    pub fn new(endpoint_url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            ai_enabled: true,
            endpoint_url: endpoint_url.into(),
            model_id: model_id.into(),
            ..Self::default()
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads from:
    /// - `USE_AI` - `true` to enable (default `false`)
    /// - `LLM_API_URL` - endpoint URL
    /// - `LLM_MODEL` - model identifier
    /// - `LLM_API_KEY` - API key (default `not-needed`)
    /// - `LLM_SPEC` - backend family (default `openai`)
    /// - `STREAM_OUTPUT` - `true` to stream by default
    /// - `LLM_TIMEOUT_SECS` - per-call deadline
    ///
    /// Values are not validated here; call [`AiConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `LLM_SPEC` or
    /// `LLM_TIMEOUT_SECS` cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    /// Overrides fields with any environment variables that are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `LLM_SPEC` or
    /// `LLM_TIMEOUT_SECS` cannot be parsed.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Overrides fields with the variables `lookup` resolves.
    ///
    /// Like [`AiConfig::merge_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`AiConfig::merge_env`].
    pub fn merge_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("USE_AI") {
            self.ai_enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("LLM_API_URL") {
            self.endpoint_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.model_id = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("LLM_SPEC") {
            self.backend_family = v.parse()?;
        }
        if let Some(v) = lookup("STREAM_OUTPUT") {
            self.streaming_default = parse_flag(&v);
        }
        if let Some(v) = lookup("LLM_TIMEOUT_SECS") {
            self.timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(format!("LLM_TIMEOUT_SECS must be an integer, got \"{v}\"")))?;
        }
        Ok(self)
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_id = model.into();
        self
    }

    /// Sets the backend family.
    #[must_use]
    pub const fn with_family(mut self, family: BackendFamily) -> Self {
        self.backend_family = family;
        self
    }

    /// Sets whether calls stream by default.
    #[must_use]
    pub const fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming_default = streaming;
        self
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The per-call deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.endpoint_url.trim().trim_end_matches('/')
    }

    /// Whether a real key (not the placeholder) is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != Self::PLACEHOLDER_API_KEY
    }

    /// Checks that the configuration can be used to open a connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Disabled`] when AI is off, and
    /// [`ConfigError::MissingField`] / [`ConfigError::InvalidValue`] for
    /// empty or malformed fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ai_enabled {
            return Err(ConfigError::Disabled);
        }

        let mut missing = Vec::new();
        if self.endpoint_url.trim().is_empty() {
            missing.push("LLM_API_URL");
        }
        if self.model_id.trim().is_empty() {
            missing.push("LLM_MODEL");
        }
        if !missing.is_empty() {
            return Err(ConfigError::missing(missing.join(", ")));
        }

        let url = url::Url::parse(self.base_url())
            .map_err(|e| ConfigError::invalid(format!("endpoint URL \"{}\": {e}", self.endpoint_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(format!(
                "endpoint URL must use http or https, got \"{}\"",
                url.scheme()
            )));
        }

        if self.backend_family == BackendFamily::DeepSeek
            && !Self::DEEPSEEK_MODELS.contains(&self.model_id.as_str())
        {
            return Err(ConfigError::invalid(format!(
                "deepseek model must be one of {:?}, got \"{}\"",
                Self::DEEPSEEK_MODELS,
                self.model_id
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            ai_enabled: false,
            endpoint_url: Self::DEFAULT_BASE_URL.to_owned(),
            model_id: String::new(),
            api_key: default_api_key(),
            backend_family: BackendFamily::default(),
            streaming_default: false,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// Keeps the API key out of logs.
impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("ai_enabled", &self.ai_enabled)
            .field("endpoint_url", &self.endpoint_url)
            .field("model_id", &self.model_id)
            .field("api_key_set", &self.has_api_key())
            .field("backend_family", &self.backend_family)
            .field("streaming_default", &self.streaming_default)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
