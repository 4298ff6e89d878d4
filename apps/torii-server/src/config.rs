//! Server configuration.
//!
//! Loads and validates configuration from a YAML file or environment
//! variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Server configuration.
///
/// Example YAML:
/// ```yaml
/// bind_addr: "127.0.0.1:2379"
/// ```
///
/// The HTTP bridge is not configured separately: it always binds the same
/// host with the port shifted by 10000.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Binary listener address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:2379".to_string()
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read config file: {}", e)))?;

        let config: ServerConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("failed to parse YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Supported variables:
    /// - TORII_BIND_ADDR
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let bind_addr =
            std::env::var("TORII_BIND_ADDR").unwrap_or_else(|_| default_bind_addr());

        let config = ServerConfig { bind_addr };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidField(format!("invalid bind_addr: {}", e)))?;
        Ok(())
    }

    /// The parsed binary listener address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidField(format!("invalid bind_addr: {}", e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid field: {0}")]
    InvalidField(String),
}
