use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BIND_ENV: &str = "COIN_SERVER_BIND";
pub const LOG_ENV: &str = "COIN_SERVER_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    /// Percentage of each gift credited to the recipient
    pub creator_share_percent: u32,
    /// Per-connection websocket notification queue size
    pub notification_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6957".to_string(),
            log_level: "info".to_string(),
            creator_share_percent: 100,
            notification_buffer: 100,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind_address) = lookup(BIND_ENV) {
            self.bind_address = bind_address;
        }
        if let Some(log_level) = lookup(LOG_ENV) {
            self.log_level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "bind_address '{}' is not a socket address",
                self.bind_address
            )));
        }
        if self.creator_share_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "creator_share_percent must be at most 100, got {}",
                self.creator_share_percent
            )));
        }
        if self.notification_buffer == 0 {
            return Err(ConfigError::Invalid(
                "notification_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
