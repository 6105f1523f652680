//! Error handling for the bot
//!
//! This module provides a unified error type using thiserror, with
//! classification helpers used when deciding whether to retry and how
//! loudly to log.

use thiserror::Error;
use tubebot_shared_config::ConfigError;
use tubebot_youtube_client::YoutubeError;

/// Main bot error type
#[derive(Error, Debug)]
pub enum BotError {
    // ========== Configuration Errors ==========
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Configuration loaded but failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ========== Discovery Errors ==========
    /// Socket configuration could not be fetched or understood
    #[error("endpoint discovery failed: {0}")]
    Discovery(String),

    /// The channel advertises no secure socket endpoint
    #[error("no secure socket endpoint advertised for channel '{channel}'")]
    NoSecureEndpoint { channel: String },

    // ========== Transport Errors ==========
    /// WebSocket failure
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport is not connected
    #[error("transport not connected")]
    NotConnected,

    /// Transport closed while an operation was waiting on it
    #[error("transport closed during operation")]
    TransportClosed,

    /// Malformed protocol payload
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    // ========== Source Errors ==========
    /// Source list file is malformed
    #[error("invalid source list: {0}")]
    SourceList(String),

    /// Feed or random source failure
    #[error("content source error: {0}")]
    Youtube(#[from] YoutubeError),

    // ========== Storage / IO Errors ==========
    /// Registry query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File system access error
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ========== Internal Errors ==========
    /// Internal bot error (catch-all for unexpected errors)
    #[error("internal bot error: {0}")]
    Internal(String),
}

impl BotError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Discovery(_)
            | Self::WebSocket(_)
            | Self::NotConnected
            | Self::TransportClosed
            | Self::Http(_) => true,
            Self::Youtube(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(_)
            | Self::InvalidConfig(_)
            | Self::NoSecureEndpoint { .. }
            | Self::Discovery(_) => ErrorSeverity::Critical,

            Self::Database(_) | Self::Filesystem(_) | Self::SourceList(_) | Self::Internal(_) => {
                ErrorSeverity::Error
            }

            Self::WebSocket(_)
            | Self::NotConnected
            | Self::TransportClosed
            | Self::Http(_)
            | Self::Youtube(_) => ErrorSeverity::Warning,

            Self::Protocol(_) => ErrorSeverity::Info,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(error = %self, retryable = self.is_retryable(), "Critical bot error");
            }
            ErrorSeverity::Error => {
                tracing::error!(error = %self, retryable = self.is_retryable(), "Bot error");
            }
            ErrorSeverity::Warning => {
                tracing::warn!(error = %self, retryable = self.is_retryable(), "Bot warning");
            }
            ErrorSeverity::Info => {
                tracing::info!(error = %self, retryable = self.is_retryable(), "Bot info");
            }
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Startup-blocking or connection-blocking errors
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected, recoverable failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for bot operations
pub type BotResult<T> = Result<T, BotError>;
