//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use unitwork::SessionConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session layer settings; the `[database]` table. Unknown keys in this
    /// table fail loading by name.
    #[serde(default)]
    pub database: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Background note retention settings.
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "unitwork_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Background purge of old notes.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Notes older than this many days are purged. `0` disables the task.
    #[serde(default)]
    pub purge_after_days: u32,

    /// Seconds between purge runs.
    #[serde(default = "default_purge_interval")]
    pub check_interval_seconds: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_purge_interval() -> u64 {
    3_600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            purge_after_days: 0,
            check_interval_seconds: default_purge_interval(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `UNITWORK_HOST` overrides `server.host`
/// - `UNITWORK_PORT` overrides `server.port`
/// - `UNITWORK_DB_TARGET` overrides `database.connection_target`
/// - `UNITWORK_LOG_LEVEL` overrides `logging.level`
/// - `UNITWORK_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed —
/// including when the `[database]` table carries an unknown key.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("UNITWORK_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("UNITWORK_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(target) = std::env::var("UNITWORK_DB_TARGET") {
        config.database.connection_target = Some(target);
    }
    if let Ok(level) = std::env::var("UNITWORK_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("UNITWORK_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
