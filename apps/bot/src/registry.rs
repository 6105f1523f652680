//! Source registry backed by SQLite
//!
//! Holds one row per tracked source with its display name and watermark,
//! populated from the static source list file.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tubebot_shared_config::DatabaseConfig;

use crate::error::{BotError, BotResult};
use crate::sources::FeedSource;
use crate::watermark::scan_entries;

/// A tracked content source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub source_id: String,
    pub name: String,
    pub watermark: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    source_id: String,
    name: String,
    watermark: Option<String>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        let watermark = row.watermark.as_deref().and_then(|raw| {
            match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    tracing::warn!(source_id = %row.source_id, raw, error = %e, "Unreadable watermark, treating as unset");
                    None
                }
            }
        });
        Self {
            source_id: row.source_id,
            name: row.name,
            watermark,
        }
    }
}

/// One `# Name` / `ID` pair from the source list file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceListEntry {
    pub name: String,
    pub source_id: String,
}

/// Parse the source list file contents
///
/// The file holds pairs of lines: `# Display Name` followed by the source
/// id. Blank lines are ignored.
pub fn parse_source_list(contents: &str) -> BotResult<Vec<SourceListEntry>> {
    let mut entries = Vec::new();
    let mut pending_name: Option<String> = None;

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match (pending_name.take(), line.strip_prefix('#')) {
            (None, Some(name)) => pending_name = Some(name.trim().to_string()),
            (Some(name), None) => entries.push(SourceListEntry {
                name,
                source_id: line.to_string(),
            }),
            (Some(name), Some(_)) => {
                return Err(BotError::SourceList(format!(
                    "line {}: expected an id for '{}', found another name",
                    index + 1,
                    name
                )))
            }
            (None, None) => {
                return Err(BotError::SourceList(format!(
                    "line {}: id '{}' has no preceding '# name' line",
                    index + 1,
                    line
                )))
            }
        }
    }

    if let Some(name) = pending_name {
        return Err(BotError::SourceList(format!(
            "'{}' has no id line",
            name
        )));
    }

    Ok(entries)
}

/// Stored watermark text; fixed precision keeps lexical order chronological
pub fn format_watermark(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Repository for tracked sources
#[derive(Clone)]
pub struct SourceRegistry {
    pool: SqlitePool,
    last_refreshed: Arc<Mutex<Option<SystemTime>>>,
}

impl SourceRegistry {
    /// Open the registry database and create the schema
    pub async fn connect(config: &DatabaseConfig) -> BotResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            // In-memory databases vanish with their last connection
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&config.url)
            .await?;

        tracing::info!(url = %config.url, "Opened source registry");
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and create the schema
    pub async fn from_pool(pool: SqlitePool) -> BotResult<Self> {
        let registry = Self {
            pool,
            last_refreshed: Arc::new(Mutex::new(None)),
        };
        registry.init().await?;
        Ok(registry)
    }

    async fn init(&self) -> BotResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                source_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                watermark TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All sources ordered by display name
    pub async fn list(&self) -> BotResult<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT source_id, name, watermark
            FROM sources
            ORDER BY name, source_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Find a source by id
    pub async fn get(&self, source_id: &str) -> BotResult<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT source_id, name, watermark
            FROM sources
            WHERE source_id = ?
            "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Source::from))
    }

    pub async fn contains(&self, source_id: &str) -> BotResult<bool> {
        let exists: i64 =
            sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM sources WHERE source_id = ?)"#)
                .bind(source_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    /// Insert a source unless its id is already registered
    ///
    /// # Returns
    /// * `Ok(true)` - If the row was inserted
    /// * `Ok(false)` - If a source with this id already existed
    pub async fn insert_if_absent(
        &self,
        source_id: &str,
        name: &str,
        watermark: Option<DateTime<Utc>>,
    ) -> BotResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sources (source_id, name, watermark)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(source_id)
        .bind(name)
        .bind(watermark.map(format_watermark))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a source's watermark forward
    ///
    /// The update only applies when `ts` is later than the stored value, so
    /// a watermark never moves backwards.
    ///
    /// # Returns
    /// * `Ok(true)` - If the stored watermark changed
    /// * `Ok(false)` - If the source is unknown or already at or past `ts`
    pub async fn advance_watermark(&self, source_id: &str, ts: DateTime<Utc>) -> BotResult<bool> {
        let ts = format_watermark(ts);
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET watermark = ?
            WHERE source_id = ? AND (watermark IS NULL OR watermark < ?)
            "#,
        )
        .bind(&ts)
        .bind(source_id)
        .bind(&ts)
        .execute(&self.pool)
        .await?;

        let advanced = result.rows_affected() == 1;
        if advanced {
            tracing::debug!(source_id, watermark = %ts, "Advanced watermark");
        }
        Ok(advanced)
    }

    /// Register new sources from the source list file
    ///
    /// Skipped when the file has not been modified since the last
    /// successful refresh. New sources start at their newest regular
    /// upload so only later uploads count as new.
    ///
    /// # Returns
    /// The number of sources inserted.
    pub async fn refresh(&self, path: &Path, feeds: &dyn FeedSource) -> BotResult<usize> {
        let modified = tokio::fs::metadata(path).await?.modified()?;
        if self.is_unchanged(modified) {
            tracing::debug!(path = %path.display(), "Source list unchanged, skipping refresh");
            return Ok(0);
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let entries = parse_source_list(&contents)?;

        let mut inserted = 0;
        for entry in entries {
            if self.contains(&entry.source_id).await? {
                continue;
            }

            let watermark = match feeds.fetch_entries(&entry.source_id).await {
                Ok(items) => scan_entries(&items, None).new_watermark,
                Err(e) => {
                    tracing::warn!(
                        source_id = %entry.source_id,
                        error = %e,
                        "Could not read feed while registering source"
                    );
                    None
                }
            };

            if self
                .insert_if_absent(&entry.source_id, &entry.name, watermark)
                .await?
            {
                tracing::info!(source_id = %entry.source_id, name = %entry.name, "Registered source");
                inserted += 1;
            }
        }

        self.mark_refreshed(modified);
        Ok(inserted)
    }

    fn is_unchanged(&self, modified: SystemTime) -> bool {
        let last = self
            .last_refreshed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last == Some(modified)
    }

    fn mark_refreshed(&self, modified: SystemTime) {
        let mut last = self
            .last_refreshed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(modified);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FeedItem;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::io::Write;

    struct StaticFeed(Vec<FeedItem>);

    #[async_trait]
    impl FeedSource for StaticFeed {
        async fn fetch_entries(&self, _source_id: &str) -> BotResult<Vec<FeedItem>> {
            Ok(self.0.clone())
        }
    }

    struct FailingFeed;

    #[async_trait]
    impl FeedSource for FailingFeed {
        async fn fetch_entries(&self, source_id: &str) -> BotResult<Vec<FeedItem>> {
            Err(BotError::Internal(format!("no feed for {source_id}")))
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    async fn registry() -> SourceRegistry {
        SourceRegistry::connect(&DatabaseConfig::in_memory())
            .await
            .unwrap()
    }

    fn source_list(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_source_list() {
        let entries = parse_source_list("# Alpha\nUC1\n\n#Beta Channel \n UC2 \n").unwrap();
        assert_eq!(
            entries,
            vec![
                SourceListEntry {
                    name: "Alpha".to_string(),
                    source_id: "UC1".to_string()
                },
                SourceListEntry {
                    name: "Beta Channel".to_string(),
                    source_id: "UC2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_source_list_rejects_odd_lines() {
        assert!(matches!(
            parse_source_list("# Alpha\nUC1\n# Dangling\n"),
            Err(BotError::SourceList(_))
        ));
        assert!(matches!(
            parse_source_list("UC1\n"),
            Err(BotError::SourceList(_))
        ));
        assert!(matches!(
            parse_source_list("# Alpha\n# Beta\nUC2\n"),
            Err(BotError::SourceList(_))
        ));
    }

    #[test]
    fn test_watermark_format_sorts_lexically() {
        let earlier = format_watermark(Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap());
        let later = format_watermark(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        assert!(earlier < later);
        assert_eq!(later, "2024-01-10T00:00:00.000000Z");
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let registry = registry().await;

        assert!(registry.insert_if_absent("UC1", "Alpha", Some(day(1))).await.unwrap());
        assert!(!registry.insert_if_absent("UC1", "Renamed", None).await.unwrap());

        let source = registry.get("UC1").await.unwrap().unwrap();
        assert_eq!(source.name, "Alpha");
        assert_eq!(source.watermark, Some(day(1)));
    }

    #[tokio::test]
    async fn test_watermark_never_moves_backwards() {
        let registry = registry().await;
        registry.insert_if_absent("UC1", "Alpha", Some(day(3))).await.unwrap();

        assert!(!registry.advance_watermark("UC1", day(2)).await.unwrap());
        assert!(!registry.advance_watermark("UC1", day(3)).await.unwrap());
        assert!(registry.advance_watermark("UC1", day(4)).await.unwrap());

        let source = registry.get("UC1").await.unwrap().unwrap();
        assert_eq!(source.watermark, Some(day(4)));
    }

    #[tokio::test]
    async fn test_null_watermark_can_be_set() {
        let registry = registry().await;
        registry.insert_if_absent("UC1", "Alpha", None).await.unwrap();
        assert!(registry.advance_watermark("UC1", day(1)).await.unwrap());
        assert!(!registry.advance_watermark("missing", day(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_registers_sources_at_newest_upload() {
        let registry = registry().await;
        let file = source_list("# Beta\nUC2\n# Alpha\nUC1\n");
        let feed = StaticFeed(vec![
            FeedItem::short("s1", day(5)),
            FeedItem::new("v4", day(4)),
            FeedItem::new("v3", day(3)),
        ]);

        let inserted = registry.refresh(file.path(), &feed).await.unwrap();
        assert_eq!(inserted, 2);

        let sources = registry.list().await.unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert!(sources.iter().all(|s| s.watermark == Some(day(4))));
    }

    #[tokio::test]
    async fn test_refresh_skips_unchanged_file() {
        let registry = registry().await;
        let file = source_list("# Alpha\nUC1\n");

        assert_eq!(registry.refresh(file.path(), &StaticFeed(vec![])).await.unwrap(), 1);
        registry.pool().close().await;

        // A closed pool would fail any query; an unchanged file issues none
        assert_eq!(registry.refresh(file.path(), &StaticFeed(vec![])).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_with_failing_feed_stores_null_watermark() {
        let registry = registry().await;
        let file = source_list("# Alpha\nUC1\n");

        registry.refresh(file.path(), &FailingFeed).await.unwrap();

        let source = registry.get("UC1").await.unwrap().unwrap();
        assert_eq!(source.watermark, None);
    }

    #[tokio::test]
    async fn test_refresh_missing_file_is_error() {
        let registry = registry().await;
        let result = registry
            .refresh(Path::new("/nonexistent/channel-ids.txt"), &StaticFeed(vec![]))
            .await;
        assert!(matches!(result, Err(BotError::Filesystem(_))));
    }
}
