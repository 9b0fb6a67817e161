//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where records are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    /// Process-local store; contents are lost on exit.
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: StorageBackend,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub templates_path: Option<PathBuf>,
    pub public_base_url: String,
    pub cors_origin: String,
    pub mail_from: String,
    pub secure_link_ttl: Duration,
    pub session_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Storage Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let storage = match var_or("STORAGE_BACKEND", "postgres").to_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let db_max_connections = parse_number(&lookup, "DB_MAX_CONNECTIONS", 5)?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Documents, Links and Mail ---
        let templates_path = lookup("TEMPLATES_PATH").map(PathBuf::from);
        let public_base_url = var_or("PUBLIC_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");
        let mail_from = var_or("MAIL_FROM", "records@localhost");

        let secure_link_ttl = Duration::hours(parse_number(&lookup, "SECURE_LINK_TTL_HOURS", 168)?);
        let session_ttl = Duration::days(parse_number(&lookup, "SESSION_TTL_DAYS", 30)?);

        Ok(Self {
            bind_address,
            storage,
            db_max_connections,
            log_level,
            templates_path,
            public_base_url,
            cors_origin,
            mail_from,
            secure_link_ttl,
            session_ttl,
        })
    }

    /// A memory-backed configuration for tests and local demos.
    pub fn in_memory() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            storage: StorageBackend::Memory,
            db_max_connections: 1,
            log_level: Level::INFO,
            templates_path: None,
            public_base_url: "http://localhost:3000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            mail_from: "records@localhost".to_string(),
            secure_link_ttl: Duration::hours(168),
            session_ttl: Duration::days(30),
        }
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
