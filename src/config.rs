use crate::core::db::{BatchOptions, ConnectionConfig};
use crate::core::{BatchliteError, Result};
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Connection-related configuration.
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub foreign_keys: Option<bool>,
    pub journal_mode: Option<String>,
}

/// Batch insert configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BatchConfig {
    /// Rows per transaction; absent means the whole batch in one transaction
    pub chunk_size: Option<usize>,
}

impl Config {
    /// Builds session settings, letting `path_override` win over the file.
    pub fn connection_config(&self, path_override: Option<&str>) -> Result<ConnectionConfig> {
        let path = path_override
            .map(str::to_string)
            .or_else(|| self.database.path.clone())
            .ok_or_else(|| BatchliteError::Config("No database path configured".to_string()))?;

        Ok(ConnectionConfig {
            path,
            busy_timeout: self.database.busy_timeout_ms.map(Duration::from_millis),
            foreign_keys: self.database.foreign_keys.unwrap_or(true),
            journal_mode: self.database.journal_mode.clone(),
        })
    }

    /// Batch options described by the `[batch]` table.
    pub fn batch_options(&self) -> Result<BatchOptions> {
        match self.batch.chunk_size {
            None => Ok(BatchOptions::atomic()),
            Some(size) => NonZeroUsize::new(size)
                .map(BatchOptions::chunked)
                .ok_or_else(|| BatchliteError::Config("batch.chunk_size must be greater than zero".to_string())),
        }
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| BatchliteError::Config(e.to_string()))?;
    config.batch_options()?;
    Ok(config)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = batchlite::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Default location of the configuration file: `<config dir>/batchlite/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("batchlite").join("config.toml"))
}
