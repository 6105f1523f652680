//! Socket endpoint discovery
//!
//! The room server publishes the real-time endpoints for each channel at
//! `{base}socketconfig/{channel}.json`; only secure endpoints are used.

use serde::Deserialize;
use tubebot_shared_config::RoomConfig;

use crate::error::{BotError, BotResult};

#[derive(Debug, Deserialize)]
struct SocketConfig {
    #[serde(default)]
    servers: Vec<SocketServer>,
}

#[derive(Debug, Deserialize)]
struct SocketServer {
    url: String,
    #[serde(default)]
    secure: bool,
}

/// Resolve the first secure endpoint advertised for a channel
#[tracing::instrument(skip(http))]
pub async fn resolve_secure_endpoint(
    http: &reqwest::Client,
    base_url: &str,
    channel: &str,
) -> BotResult<String> {
    let url = format!(
        "{}/socketconfig/{}.json",
        base_url.trim_end_matches('/'),
        channel
    );

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| BotError::Discovery(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BotError::Discovery(format!(
            "{} returned status {}",
            url, status
        )));
    }

    let config: SocketConfig = response
        .json()
        .await
        .map_err(|e| BotError::Discovery(format!("invalid socket config from {}: {}", url, e)))?;

    let endpoint = config
        .servers
        .into_iter()
        .find(|server| server.secure)
        .map(|server| server.url)
        .ok_or_else(|| BotError::NoSecureEndpoint {
            channel: channel.to_string(),
        })?;

    tracing::info!(endpoint = %endpoint, "Resolved socket endpoint");
    Ok(endpoint)
}

/// Discovery bound to one room
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    http: reqwest::Client,
    room: RoomConfig,
}

impl EndpointResolver {
    pub fn new(http: reqwest::Client, room: RoomConfig) -> Self {
        Self { http, room }
    }

    pub fn room(&self) -> &RoomConfig {
        &self.room
    }

    pub async fn resolve(&self) -> BotResult<String> {
        resolve_secure_endpoint(&self.http, &self.room.url, &self.room.channel).await
    }
}
