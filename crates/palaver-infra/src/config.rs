//! Config file loading.
//!
//! Reads the TOML config file, fills defaults for anything omitted and
//! validates the result. Unlike purely optional settings files, the bot
//! cannot run without credentials, so a missing file is an error here.

use std::path::Path;

use palaver_types::config::{BotConfig, ConfigError};

/// Failure to produce a usable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load and validate the bot configuration from a TOML file.
pub async fn load_config(path: &Path) -> Result<BotConfig, ConfigLoadError> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigLoadError::Read {
                path: path.display().to_string(),
                source,
            })?;

    let config: BotConfig =
        toml::from_str(&content).map_err(|source| ConfigLoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    config.validate()?;
    tracing::debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}
