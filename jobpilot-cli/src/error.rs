//! Error type for the command-line front end.

use crate::config::ConfigError;

/// Result alias used by every command.
pub type Result<T> = std::result::Result<T, CliError>;

/// Anything that can make a command fail.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Loading or saving the config file failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The answer pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] jobpilot::Error),

    /// Reading input failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The command ran but did not succeed.
    #[error("{0}")]
    Failed(String),
}

impl CliError {
    /// Create a command-failed error.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<jobpilot::ConfigError> for CliError {
    fn from(err: jobpilot::ConfigError) -> Self {
        Self::Pipeline(err.into())
    }
}
