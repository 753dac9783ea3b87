//! Configuration management for the `jobpilot` binary.
//!
//! Settings are resolved from:
//! 1. Default values
//! 2. Config file (`~/.jobpilot/config.toml`)
//! 3. `LLM_*` / `USE_AI` / `STREAM_OUTPUT` environment variables

mod schema;

pub use schema::CliConfig;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// An environment override could not be applied.
    #[error(transparent)]
    Env(#[from] jobpilot::ConfigError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Get the default config directory path.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".jobpilot")
}

/// Get the default config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load the file at `path` (or the default path) and apply environment overrides.
pub async fn resolve_config(path: Option<&Path>) -> ConfigResult<CliConfig> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config = load_config_from(&path).await?;
    config.merge_env()
}

/// Load configuration from a specific path, without environment overrides.
pub async fn load_config_from(path: &Path) -> ConfigResult<CliConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(CliConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: CliConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "loaded config file");

    Ok(config)
}

/// Save configuration to a specific path.
pub async fn save_config_to(config: &CliConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = toml::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), "saved config file");

    Ok(())
}

/// Write a default config to `path`, replacing an existing one only if `force`.
///
/// Returns the config now on disk.
pub async fn init_config_at(path: &Path, force: bool) -> ConfigResult<CliConfig> {
    if path.exists() && !force {
        return load_config_from(path).await;
    }

    let config = CliConfig::default();
    save_config_to(&config, path).await?;
    tokio::fs::create_dir_all(&config.logging.logs_dir).await?;
    info!("created default config at {}", path.display());

    Ok(config)
}
