//! Per-source watermark scanning
//!
//! A source's watermark is the publish time of the newest item already
//! handled. Scanning walks the feed newest-first and stops at the first
//! entry at or below the watermark.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::registry::Source;
use crate::sources::{FeedItem, FeedSource};

/// Result of scanning one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// New items, oldest first
    pub items: Vec<FeedItem>,
    /// Watermark to store, `None` when it stays unchanged
    pub new_watermark: Option<DateTime<Utc>>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Compute new items from a newest-first feed
///
/// A source without a watermark is seeded with its newest regular entry
/// and reports nothing new.
pub fn scan_entries(entries: &[FeedItem], watermark: Option<DateTime<Utc>>) -> ScanResult {
    let mut regular = entries.iter().filter(|entry| !entry.short_form);

    let Some(watermark) = watermark else {
        return ScanResult {
            items: Vec::new(),
            new_watermark: regular.next().map(|entry| entry.published_at),
        };
    };

    let mut items: Vec<FeedItem> = regular
        .take_while(|entry| entry.published_at > watermark)
        .cloned()
        .collect();
    items.reverse();

    let new_watermark = items.iter().map(|item| item.published_at).max();
    ScanResult {
        items,
        new_watermark,
    }
}

/// Scans sources through a [`FeedSource`]
#[derive(Clone)]
pub struct WatermarkTracker {
    feeds: Arc<dyn FeedSource>,
}

impl WatermarkTracker {
    pub fn new(feeds: Arc<dyn FeedSource>) -> Self {
        Self { feeds }
    }

    /// Scan one source; a failed fetch yields no items
    pub async fn scan_source(&self, source: &Source) -> ScanResult {
        match self.feeds.fetch_entries(&source.source_id).await {
            Ok(entries) => {
                let result = scan_entries(&entries, source.watermark);
                tracing::debug!(
                    source_id = %source.source_id,
                    entries = entries.len(),
                    new_items = result.items.len(),
                    "Scanned source"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    source_id = %source.source_id,
                    error = %e,
                    "Feed fetch failed, treating source as unchanged"
                );
                ScanResult::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn ids(result: &ScanResult) -> Vec<&str> {
        result.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_scan_returns_new_items_oldest_first() {
        let feed = vec![
            FeedItem::new("v3", day(3)),
            FeedItem::new("v2", day(2)),
            FeedItem::new("v1", day(1)),
        ];

        let result = scan_entries(&feed, Some(day(1)));

        assert_eq!(ids(&result), vec!["v2", "v3"]);
        assert_eq!(result.new_watermark, Some(day(3)));
    }

    #[test]
    fn test_scan_skips_short_form() {
        let feed = vec![
            FeedItem::short("s2", day(5)),
            FeedItem::new("v4", day(4)),
            FeedItem::short("s1", day(3)),
            FeedItem::new("v2", day(2)),
        ];

        let result = scan_entries(&feed, Some(day(1)));

        assert_eq!(ids(&result), vec!["v2", "v4"]);
        assert_eq!(result.new_watermark, Some(day(4)));
    }

    #[test]
    fn test_equal_timestamp_is_already_seen() {
        let feed = vec![FeedItem::new("v1", day(1))];
        let result = scan_entries(&feed, Some(day(1)));
        assert!(result.is_empty());
        assert_eq!(result.new_watermark, None);
    }

    #[test]
    fn test_scan_stops_at_first_seen_entry() {
        let feed = vec![
            FeedItem::new("v3", day(3)),
            FeedItem::new("old", day(1)),
            FeedItem::new("out_of_order", day(2)),
        ];
        let result = scan_entries(&feed, Some(day(1)));
        assert_eq!(ids(&result), vec!["v3"]);
    }

    #[test]
    fn test_never_reports_items_at_or_below_watermark() {
        let feed: Vec<FeedItem> = (1..=9)
            .rev()
            .map(|d| FeedItem::new(format!("v{d}"), day(d)))
            .collect();

        for w in 1..=9 {
            let result = scan_entries(&feed, Some(day(w)));
            assert!(result.items.iter().all(|i| i.published_at > day(w)));
            assert_eq!(result.items.len(), (9 - w) as usize);
        }
    }

    #[test]
    fn test_missing_watermark_is_seeded() {
        let feed = vec![FeedItem::short("s1", day(4)), FeedItem::new("v3", day(3))];
        let result = scan_entries(&feed, None);
        assert!(result.is_empty());
        assert_eq!(result.new_watermark, Some(day(3)));
    }

    #[test]
    fn test_empty_feed() {
        assert_eq!(scan_entries(&[], Some(day(1))), ScanResult::default());
        assert_eq!(scan_entries(&[], None), ScanResult::default());
    }
}
