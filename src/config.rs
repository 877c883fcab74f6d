//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// How long a unit waits for a row lock before giving up
    pub lock_timeout: Duration,

    /// Bearer session lifetime
    pub session_ttl: Duration,

    /// Balance granted on registration
    pub initial_coins: i64,

    /// JSON price list replacing the built-in catalog
    pub catalog_file: Option<PathBuf>,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = parse_or(&lookup, "PORT", 8080)?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let lock_timeout = Duration::from_millis(parse_or(&lookup, "LOCK_TIMEOUT_MS", 5000)?);
        if lock_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("LOCK_TIMEOUT_MS"));
        }

        let session_ttl = Duration::from_secs(parse_or(&lookup, "SESSION_TTL_SECS", 3600)?);
        if session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue("SESSION_TTL_SECS"));
        }

        let initial_coins: i64 = parse_or(&lookup, "INITIAL_COINS", 1000)?;
        if initial_coins < 0 {
            return Err(ConfigError::InvalidValue("INITIAL_COINS"));
        }

        let catalog_file = lookup("CATALOG_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            lock_timeout,
            session_ttl,
            initial_coins,
            catalog_file,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
