//! Shared configuration types for tubebot
//!
//! This crate provides the configuration types used by the bot binary and
//! its integration tests, so every entry point reads the environment the
//! same way.

mod database;
mod error;
mod room;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ConfigResult};
pub use room::RoomConfig;

use std::env;

/// Common configuration shared between all entry points
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Source registry database configuration
    pub database: DatabaseConfig,

    /// Room server, channel and bot account
    pub room: RoomConfig,

    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL)
    pub log_level: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Merge a local `.env` file into the process environment, then load
    ///
    /// A missing `.env` file is not an error; variables already present in
    /// the environment take precedence over the file.
    pub fn load() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            room: RoomConfig::from_env()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Build a configuration around an explicit room (useful for testing)
    pub fn for_room(room: RoomConfig) -> Self {
        Self {
            database: DatabaseConfig::default(),
            room,
            environment: Environment::Development,
            log_level: "info".to_string(),
        }
    }
}

/// Helper function to get a required environment variable
///
/// Empty or whitespace-only values count as missing.
pub fn get_required_env(name: &str) -> ConfigResult<String> {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
