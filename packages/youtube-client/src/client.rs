//! YouTube client implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{YoutubeError, YoutubeResult};
use crate::models::{FeedEntry, RawFeed};

/// YouTube base URL (feeds and search live on the same host)
const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum channel id length
const MAX_CHANNEL_ID_LENGTH: usize = 64;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Narrowest random search pool
pub const MIN_POOL_WIDTH: u32 = 1;

/// Widest random search pool
pub const MAX_POOL_WIDTH: u32 = 10;

/// Markers around the results document embedded in a search page
const INITIAL_DATA_START: &str = "ytInitialData = ";
const INITIAL_DATA_END: &str = ";</script>";

const QUERY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Clamp a requested random pool width into `[MIN_POOL_WIDTH, MAX_POOL_WIDTH]`
pub fn clamp_pool_width(width: u32) -> u32 {
    width.clamp(MIN_POOL_WIDTH, MAX_POOL_WIDTH)
}

/// YouTube feed and search client
#[derive(Clone)]
pub struct YoutubeClient {
    http_client: Client,
    feeds_base: String,
    search_base: String,
    max_retries: u32,
}

impl fmt::Debug for YoutubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YoutubeClient")
            .field("feeds_base", &self.feeds_base)
            .field("search_base", &self.search_base)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl YoutubeClient {
    /// Create a client against the public YouTube endpoints
    pub fn new() -> YoutubeResult<Self> {
        Self::with_base_urls(YOUTUBE_BASE_URL, YOUTUBE_BASE_URL)
    }

    /// Create a client against custom endpoints (mock servers in tests)
    pub fn with_base_urls(
        feeds_base: impl Into<String>,
        search_base: impl Into<String>,
    ) -> YoutubeResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("tubebot/0.1")
            .build()?;

        Ok(Self {
            http_client,
            feeds_base: feeds_base.into().trim_end_matches('/').to_string(),
            search_base: search_base.into().trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the number of retries for transient failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate channel id input
    fn validate_channel_id(channel_id: &str) -> YoutubeResult<&str> {
        let trimmed = channel_id.trim();
        if trimmed.is_empty() {
            return Err(YoutubeError::InvalidInput(
                "channel id cannot be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_CHANNEL_ID_LENGTH {
            return Err(YoutubeError::InvalidInput(format!(
                "channel id too long (max {} characters)",
                MAX_CHANNEL_ID_LENGTH
            )));
        }
        Ok(trimmed)
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> YoutubeResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = YoutubeResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay_ms = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "YouTube request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make a GET request and return the body, mapping status failures
    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> YoutubeResult<String> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    YoutubeError::Timeout
                } else {
                    YoutubeError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("YouTube rate limited");
            return Err(YoutubeError::RateLimited);
        }
        if !status.is_success() {
            return Err(YoutubeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(YoutubeError::Http)
    }

    /// Fetch a channel's upload feed
    ///
    /// Entries are returned in feed order, which is newest first.
    ///
    /// # Errors
    /// - `YoutubeError::InvalidInput` - If the channel id is empty or too long
    /// - `YoutubeError::ChannelNotFound` - If YouTube has no feed for the channel
    /// - `YoutubeError::Feed` - If the XML cannot be parsed
    /// - `YoutubeError::Http` - If the HTTP request fails
    #[instrument(skip(self))]
    pub async fn fetch_feed(&self, channel_id: &str) -> YoutubeResult<Vec<FeedEntry>> {
        let channel_id = Self::validate_channel_id(channel_id)?;
        let url = format!("{}/feeds/videos.xml", self.feeds_base);

        debug!(channel = %channel_id, "Fetching channel feed");

        let text = self
            .with_retry(|| async { self.get_text(&url, &[("channel_id", channel_id)]).await })
            .await
            .map_err(|e| match e {
                YoutubeError::Status { status: 404, .. } => {
                    YoutubeError::ChannelNotFound(channel_id.to_string())
                }
                other => other,
            })?;

        let entries = parse_feed(&text)?;

        debug!(
            channel = %channel_id,
            entry_count = entries.len(),
            "Parsed channel feed"
        );

        Ok(entries)
    }

    /// Pick one random video from a search for a random query
    ///
    /// `pool_width` is the length of the random query string; it is clamped
    /// to `[MIN_POOL_WIDTH, MAX_POOL_WIDTH]`. Longer queries match fewer
    /// videos. Returns `Ok(None)` when the search has no video results.
    #[instrument(skip(self))]
    pub async fn find_random(&self, pool_width: u32) -> YoutubeResult<Option<String>> {
        let query = random_query(clamp_pool_width(pool_width));
        let url = format!("{}/results", self.search_base);

        debug!(query = %query, "Searching for a random video");

        let text = self
            .with_retry(|| async {
                self.get_text(&url, &[("search_query", query.as_str())])
                    .await
            })
            .await?;

        let ids = parse_search_results(&text)?;
        let picked = ids.choose(&mut rand::thread_rng()).cloned();

        debug!(
            query = %query,
            result_count = ids.len(),
            picked = ?picked,
            "Random search finished"
        );

        Ok(picked)
    }
}

/// Parse an Atom upload feed into entries, newest first
pub(crate) fn parse_feed(xml: &str) -> YoutubeResult<Vec<FeedEntry>> {
    let feed: RawFeed = quick_xml::de::from_str(xml)?;
    Ok(feed
        .entries
        .into_iter()
        .filter_map(|raw| raw.into_entry())
        .collect())
}

/// Extract video ids from a search results page
pub(crate) fn parse_search_results(page: &str) -> YoutubeResult<Vec<String>> {
    let json = page
        .split_once(INITIAL_DATA_START)
        .and_then(|(_, rest)| rest.split_once(INITIAL_DATA_END))
        .map(|(json, _)| json)
        .ok_or(YoutubeError::MissingInitialData)?;

    let data: Value = serde_json::from_str(json)?;

    let sections = data
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let ids = sections
        .iter()
        .filter_map(|section| section.pointer("/itemSectionRenderer/contents"))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|item| item.pointer("/videoRenderer/videoId"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    Ok(ids)
}

fn random_query(len: u32) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| QUERY_ALPHABET[rng.gen_range(0..QUERY_ALPHABET.len())] as char)
        .collect()
}
