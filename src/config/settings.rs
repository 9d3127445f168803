//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Log levels accepted in `logging.level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if !self.server.endpoint.starts_with('/') {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid endpoint '{}'. Must start with '/'",
                    self.server.endpoint
                ),
            });
        }

        if self.server.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Server name cannot be empty".to_string(),
            });
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Path of the JSON-RPC endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Server name reported during `initialize`.
    #[serde(default = "default_name")]
    pub name: String,

    /// Server version reported during `initialize`.
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional usage instructions returned to clients during `initialize`.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address is not a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|e| ConfigError::ValidationError {
                message: format!("Invalid bind address '{}': {e}", self.bind_address),
            })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            endpoint: default_endpoint(),
            name: default_name(),
            version: default_version(),
            instructions: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_endpoint() -> String {
    "/mcp".to_string()
}

fn default_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
