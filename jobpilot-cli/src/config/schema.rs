//! Configuration schema definitions.

use std::path::PathBuf;

use jobpilot::{AiConfig, ConfigError as AiConfigError};
use serde::{Deserialize, Serialize};

use super::ConfigResult;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Backend connection.
    #[serde(default)]
    pub ai: AiConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Operator alerts.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Candidate profile used in prompts.
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Directory holding `log.txt`.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

fn default_logs_dir() -> PathBuf {
    super::default_config_dir().join("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
        }
    }
}

/// Alert configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Ask on the console when a backend call fails.
    #[serde(default = "default_true")]
    pub show_ai_error_alerts: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            show_ai_error_alerts: true,
        }
    }
}

/// Candidate profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Résumé-like text handed to the answer prompt.
    #[serde(default)]
    pub user_information: Option<String>,
}

impl CliConfig {
    /// Validate the configuration and return any issues found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        match self.ai.validate() {
            Ok(()) => {}
            Err(AiConfigError::Disabled) => issues.push(ConfigIssue::warning(
                "ai.ai_enabled",
                "AI answering is disabled. Set USE_AI=true to turn it on.",
            )),
            Err(e) => issues.push(ConfigIssue::error("ai", e.to_string())),
        }

        if self.ai.ai_enabled
            && self.ai.base_url() == AiConfig::DEFAULT_BASE_URL.trim_end_matches('/')
            && !self.ai.has_api_key()
        {
            issues.push(ConfigIssue::warning(
                "ai.api_key",
                "Using the OpenAI API without a key. Set LLM_API_KEY.",
            ));
        }

        if self
            .profile
            .user_information
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            issues.push(ConfigIssue::warning(
                "profile.user_information",
                "No candidate information; answers will be generic.",
            ));
        }

        issues
    }

    /// Check if the configuration has no error-level issues.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|issue| issue.level != IssueLevel::Error)
    }

    /// Merge environment variables into the configuration.
    pub fn merge_env(mut self) -> ConfigResult<Self> {
        self.ai = self.ai.merge_env()?;
        Ok(self)
    }
}

/// A configuration issue found during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Issue severity level.
    pub level: IssueLevel,
    /// Configuration path (e.g., "ai.api_key").
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ConfigIssue {
    /// Create an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warning => "WARN",
        };
        write!(f, "[{}] {}: {}", prefix, self.path, self.message)
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The pipeline cannot run with this value.
    Error,
    /// Works, but probably not as intended.
    Warning,
}
