//! YouTube feed models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upload from a channel feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Video identifier
    pub video_id: String,
    /// Video title
    pub title: String,
    /// Watch page URL (if present)
    pub link: Option<String>,
    /// Publish timestamp
    pub published: DateTime<Utc>,
}

impl FeedEntry {
    /// Whether this entry is short-form content
    ///
    /// Shorts are tagged `#shorts` in the title or served from a `/shorts/`
    /// URL.
    pub fn is_short_form(&self) -> bool {
        self.title.to_lowercase().contains("#shorts")
            || self
                .link
                .as_deref()
                .is_some_and(|link| link.contains("/shorts/"))
    }
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct RawFeed {
    #[serde(rename = "entry", default)]
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    #[serde(rename = "yt:videoId", alias = "videoId")]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: Option<RawLink>,
    pub published: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLink {
    #[serde(rename = "@href")]
    pub href: String,
}

impl RawEntry {
    /// Convert to a [`FeedEntry`], dropping entries with unparseable dates
    pub(crate) fn into_entry(self) -> Option<FeedEntry> {
        match DateTime::parse_from_rfc3339(self.published.trim()) {
            Ok(published) => Some(FeedEntry {
                video_id: self.video_id.trim().to_string(),
                title: self.title,
                link: self.link.map(|l| l.href),
                published: published.with_timezone(&Utc),
            }),
            Err(e) => {
                tracing::warn!(
                    video_id = %self.video_id,
                    raw_published = %self.published,
                    error = %e,
                    "Skipping feed entry with invalid publish date"
                );
                None
            }
        }
    }
}
