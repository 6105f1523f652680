//! Room server configuration types

use std::fmt;

use crate::{get_required_env, ConfigError, ConfigResult};

/// Room server, channel and bot account
#[derive(Clone)]
pub struct RoomConfig {
    /// Base URL of the room server, always ending in `/`
    pub url: String,

    /// Channel to join
    pub channel: String,

    /// Bot account name
    pub username: String,

    /// Bot account password
    pub password: String,
}

impl fmt::Debug for RoomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomConfig")
            .field("url", &self.url)
            .field("channel", &self.channel)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl RoomConfig {
    /// Load room configuration from environment variables
    ///
    /// All four variables are required; any missing one is a startup error.
    pub fn from_env() -> ConfigResult<Self> {
        let url = get_required_env("CYTUBE_URL")?;
        let channel = get_required_env("CYTUBE_URL_CHANNEL_NAME")?;
        let username = get_required_env("CYTUBE_USERNAME")?;
        let password = get_required_env("CYTUBE_PASSWORD")?;

        Self::validated(url, channel, username, password)
    }

    /// Create a configuration from explicit values (useful for testing)
    pub fn new(
        url: impl Into<String>,
        channel: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: normalize_base(&url.into()),
            channel: channel.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn validated(
        url: String,
        channel: String,
        username: String,
        password: String,
    ) -> ConfigResult<Self> {
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(
                "CYTUBE_URL".to_string(),
                "expected an http:// or https:// URL".to_string(),
            ));
        }

        Ok(Self::new(trimmed, channel.trim(), username.trim(), password))
    }

    /// URL of the channel's socket configuration document
    pub fn socket_config_url(&self) -> String {
        format!("{}socketconfig/{}.json", self.url, self.channel)
    }
}

fn normalize_base(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}
