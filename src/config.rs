//! Bot configuration
//!
//! Loaded from a YAML file, `config/gavel.yaml` unless `GAVEL_CONFIG` points
//! elsewhere. The bot token always comes from `DISCORD_TOKEN`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/gavel.yaml";
pub const CONFIG_PATH_ENV: &str = "GAVEL_CONFIG";
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_confirmation_timeout_secs() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_prefix() -> String {
    "!".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Guild the bot moderates
    pub guild_id: u64,
    /// Channel for the audit trail; logs only to tracing when unset
    #[serde(default)]
    pub admin_log_channel_id: Option<u64>,
    #[serde(default)]
    pub muted_role_id: Option<u64>,
    /// Roles allowed to run moderation commands
    #[serde(default)]
    pub moderator_role_ids: Vec<u64>,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl BotConfig {
    /// Parse and validate a YAML document
    ///
    /// # Errors
    /// Returns `Parse` for malformed YAML and `Invalid` for values out of range.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, otherwise see [`BotConfig::from_yaml`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&yaml)
    }

    /// Load from `GAVEL_CONFIG` or the default path
    ///
    /// # Errors
    /// See [`BotConfig::load`].
    pub async fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(path).await
    }

    /// # Errors
    /// Returns `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guild_id == 0 {
            return Err(ConfigError::Invalid("guild_id must be set".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than zero".into(),
            ));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "confirmation_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.moderator_role_ids.is_empty() {
            return Err(ConfigError::Invalid(
                "moderator_role_ids must name at least one role".into(),
            ));
        }
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("prefix must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    #[must_use]
    pub fn is_moderator_role(&self, role_id: u64) -> bool {
        self.moderator_role_ids.contains(&role_id)
    }
}

/// Bot token from the environment
///
/// # Errors
/// Returns `MissingEnv` when `DISCORD_TOKEN` is unset.
pub fn discord_token() -> Result<String, ConfigError> {
    std::env::var(TOKEN_ENV).map_err(|_| ConfigError::MissingEnv(TOKEN_ENV))
}
