//! Configuration module for loading and parsing TOML configuration files.
//!
//! Every section is optional; missing values fall back to their defaults.
//! `HOST`, `PORT` and `DATABASE_URL` override the file when set.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use utoipa::ToSchema;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "ITOPS_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Topology renderer defaults.
    pub topology: TopologyConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string. Without one the server runs on the
    /// in-memory store.
    pub url: Option<String>,
    /// Pool size.
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout_secs: u64,
    /// Whether to apply migrations at startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether limits are enforced at all.
    pub enabled: bool,
    /// Allow requests when the counter store fails.
    pub swallow_errors: bool,
    /// Seconds between purges of expired counters.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            swallow_errors: true,
            cleanup_interval_secs: 60,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of issued tokens.
    pub token_ttl_secs: u64,
    /// Consecutive failed logins that lock an account. `0` disables lockout.
    pub max_failed_logins: u32,
    /// How long a locked account stays locked.
    pub lockout_minutes: u64,
    /// Administrator created when the user table is empty.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 86_400,
            max_failed_logins: 5,
            lockout_minutes: 30,
            bootstrap_admin: None,
        }
    }
}

impl AuthConfig {
    /// Lock duration after too many failed logins.
    #[must_use]
    pub fn lockout_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lockout_minutes.min(u64::from(u32::MAX)) as i64)
    }
}

/// Initial administrator credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    /// Login name.
    pub username: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
}

/// Topology renderer defaults returned by the topology config endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TopologyConfig {
    /// Preferred layout (`circular`, `grid`, `force`).
    pub layout_algorithm: String,
    /// Draw port labels on edges.
    pub show_ports: bool,
    /// Draw node labels.
    pub show_labels: bool,
    /// Node diameter in pixels.
    pub node_size: u32,
    /// Edge width in pixels.
    pub edge_width: u32,
    /// Poll the topology periodically.
    pub auto_refresh: bool,
    /// Poll interval in seconds.
    pub refresh_interval: u32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            layout_algorithm: "force".to_string(),
            show_ports: true,
            show_labels: true,
            node_size: 40,
            edge_width: 2,
            auto_refresh: false,
            refresh_interval: 30,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Arguments
    /// * `content` - TOML content as string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `ITOPS_CONFIG` (or `config.toml`) when it
    /// exists, then applies environment overrides.
    ///
    /// # Errors
    /// Returns error if an existing file is invalid or an override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = if Path::new(&path).exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };

        config.apply_overrides(
            std::env::var("HOST").ok(),
            std::env::var("PORT").ok(),
            std::env::var("DATABASE_URL").ok(),
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `HOST`, `PORT` and `DATABASE_URL` style overrides.
    ///
    /// # Errors
    /// Returns error if `port` is not a valid port number.
    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
        database_url: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT is not a port: {}", port)))?;
        }
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            self.database.url = Some(url);
        }
        Ok(())
    }

    /// Validates the configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue(
                "server port must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database max_connections must be positive".to_string(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.rate_limit.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit cleanup_interval_secs must be positive".to_string(),
            ));
        }
        if let Some(ref admin) = self.auth.bootstrap_admin {
            if admin.username.is_empty() || admin.password.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "bootstrap admin username and password cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
