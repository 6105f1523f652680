//! Content source seams
//!
//! The core only sees [`FeedSource`] and [`RandomSource`]; the YouTube
//! client implements both, tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tubebot_youtube_client::{FeedEntry, YoutubeClient};

use crate::error::BotResult;

/// One entry of a source's feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub published_at: DateTime<Utc>,
    pub short_form: bool,
}

impl FeedItem {
    pub fn new(id: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            published_at,
            short_form: false,
        }
    }

    pub fn short(id: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            short_form: true,
            ..Self::new(id, published_at)
        }
    }
}

impl From<FeedEntry> for FeedItem {
    fn from(entry: FeedEntry) -> Self {
        let short_form = entry.is_short_form();
        Self {
            id: entry.video_id,
            published_at: entry.published,
            short_form,
        }
    }
}

/// Source of per-channel feed entries, newest first
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self, source_id: &str) -> BotResult<Vec<FeedItem>>;
}

/// Source of a single random item
#[async_trait]
pub trait RandomSource: Send + Sync {
    async fn find_random_item(&self, pool_width: u32) -> BotResult<Option<String>>;
}

#[async_trait]
impl FeedSource for YoutubeClient {
    async fn fetch_entries(&self, source_id: &str) -> BotResult<Vec<FeedItem>> {
        let entries = self.fetch_feed(source_id).await?;
        Ok(entries.into_iter().map(FeedItem::from).collect())
    }
}

#[async_trait]
impl RandomSource for YoutubeClient {
    async fn find_random_item(&self, pool_width: u32) -> BotResult<Option<String>> {
        Ok(self.find_random(pool_width).await?)
    }
}
