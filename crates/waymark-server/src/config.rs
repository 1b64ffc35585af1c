//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request limits.
    #[serde(default)]
    pub limits: LimitsConfig,
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

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "waymark_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Authentication configuration.
///
/// Mutation and admin routes require `Authorization: Bearer <admin_token>`.
/// An empty token matches no request, so the mutation surface stays closed
/// until one is configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared bearer token for the host-forum caller.
    #[serde(default)]
    pub admin_token: String,
}

/// Request limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Per-client request budget per fixed one-minute window.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "waymark.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_connections() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_requests_per_minute() -> u32 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_connections: default_max_connections(),
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

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
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
/// - `WAYMARK_HOST` overrides `server.host`
/// - `WAYMARK_PORT` overrides `server.port`
/// - `WAYMARK_DB_PATH` overrides `database.path`
/// - `WAYMARK_LOG_LEVEL` overrides `logging.level`
/// - `WAYMARK_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `WAYMARK_ADMIN_TOKEN` overrides `auth.admin_token`
/// - `WAYMARK_RATE_LIMIT` overrides `limits.requests_per_minute`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
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
    if let Ok(host) = std::env::var("WAYMARK_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("WAYMARK_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("WAYMARK_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("WAYMARK_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("WAYMARK_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(token) = std::env::var("WAYMARK_ADMIN_TOKEN") {
        config.auth.admin_token = token;
    }
    if let Ok(limit) = std::env::var("WAYMARK_RATE_LIMIT") {
        if let Ok(parsed) = limit.parse() {
            config.limits.requests_per_minute = parsed;
        }
    }

    Ok(config)
}
