use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use common::crypto::KeySource;

use crate::handler::DEFAULT_MAX_REQUEST_SIZE;

/// Service configuration, usually read from a `config.toml`
///
/// ```toml
/// key_source = "os"
/// log_level = "debug"
/// max_request_size = 65536
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where the authority key comes from
    #[serde(default)]
    pub key_source: KeySource,
    /// Default tracing level, RUST_LOG still overrides it
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Requests larger than this are rejected as malformed
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_request_size() -> usize {
    DEFAULT_MAX_REQUEST_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_source: KeySource::default(),
            log_level: default_log_level(),
            max_request_size: default_max_request_size(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }
}
