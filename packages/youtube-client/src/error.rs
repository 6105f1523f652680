//! YouTube client error types

use thiserror::Error;

/// YouTube client errors
#[derive(Error, Debug)]
pub enum YoutubeError {
    /// Invalid input provided to a client method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed XML could not be parsed
    #[error("Failed to parse feed: {0}")]
    Feed(#[from] quick_xml::de::DeError),

    /// Search page JSON could not be parsed
    #[error("Failed to parse search results: {0}")]
    Parse(#[from] serde_json::Error),

    /// YouTube returned a non-success status
    #[error("YouTube returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Channel feed does not exist
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Search page did not contain the embedded results document
    #[error("Search page is missing the initial data document")]
    MissingInitialData,

    /// Rate limited by YouTube
    #[error("Rate limited by YouTube")]
    RateLimited,

    /// Request timeout
    #[error("Request to YouTube timed out")]
    Timeout,
}

impl YoutubeError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on:
    /// - Timeouts
    /// - Rate limiting
    /// - Transport errors (connect, timeout)
    /// - Server errors (5xx)
    ///
    /// Does NOT retry on client errors (4xx except 429 rate limiting).
    pub fn is_retryable(&self) -> bool {
        match self {
            YoutubeError::Timeout | YoutubeError::RateLimited => true,
            YoutubeError::Status { status, .. } => *status >= 500,
            YoutubeError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type for YouTube operations
pub type YoutubeResult<T> = Result<T, YoutubeError>;
