//! Client configuration at `~/.gapi/config.toml`.
//!
//! Provides reconnect, keepalive, and log file defaults.
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
}

/// Connection and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seconds between reconnect attempts.
    #[serde(default = "default_reconnect_time")]
    pub reconnect_time: u64,

    /// Seconds between keepalive pings.
    #[serde(default = "default_keep_alive_time")]
    pub keep_alive_time: u64,

    /// Append logs to this file in addition to stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_time: default_reconnect_time(),
            keep_alive_time: default_keep_alive_time(),
            log_file: None,
        }
    }
}

fn default_reconnect_time() -> u64 {
    6
}

fn default_keep_alive_time() -> u64 {
    60
}

impl Config {
    /// Default location, `~/.gapi/config.toml`.
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(".gapi").join("config.toml")
    }

    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// Reject intervals that would turn the reconnect or keepalive loop into a spin.
pub fn require_positive(name: &str, secs: u64) -> Result<u64> {
    if secs == 0 {
        anyhow::bail!("{name} must be at least 1 second");
    }
    Ok(secs)
}
