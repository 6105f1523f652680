//! Database configuration types

use crate::{get_env_or_default, parse_env, ConfigResult};

const DEFAULT_DATABASE_URL: &str = "sqlite://content.db?mode=rwc";

/// SQLite source registry configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL (e.g., sqlite://content.db?mode=rwc)
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            url: get_env_or_default("DATABASE_URL", DEFAULT_DATABASE_URL),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 1)?,
            connect_timeout_secs: parse_env("DATABASE_CONNECT_TIMEOUT", 30)?,
        })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// In-memory database, one connection so every query sees the same data
    pub fn in_memory() -> Self {
        Self::with_url("sqlite::memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}
