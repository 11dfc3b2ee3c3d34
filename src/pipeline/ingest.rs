use std::sync::Arc;

use chrono::Utc;

use crate::db::ArticleStore;
use crate::error::Result;
use crate::feed::{normalize, FeedSource};
use crate::models::{Article, ArticleUpdate, InsertOutcome, NewArticle, RawEntry};
use crate::services::{ArtifactKey, ArtifactStore, ContentResolver};

/// What happened to a single feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// New row inserted and its content stored.
    Created,
    /// Row existed without its markdown artifact; content stored again.
    Repaired,
    /// Row and artifact already present.
    Unchanged,
    /// A concurrent writer owns the row and has not stored content yet.
    Deferred,
    /// No usable identity or link.
    Skipped,
}

/// Per-feed counters from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub subscription_name: String,
    pub malformed: bool,
    pub created: usize,
    pub repaired: usize,
    pub unchanged: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestReport {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Created => self.created += 1,
            EntryOutcome::Repaired => self.repaired += 1,
            EntryOutcome::Unchanged => self.unchanged += 1,
            EntryOutcome::Deferred => self.deferred += 1,
            EntryOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.repaired + self.unchanged + self.deferred + self.skipped + self.failed
    }
}

/// Reads a feed and brings every entry to the "downloaded" state.
pub struct IngestionPipeline {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn ArticleStore>,
    resolver: Arc<ContentResolver>,
    artifacts: Arc<ArtifactStore>,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn ArticleStore>,
        resolver: Arc<ContentResolver>,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            source,
            store,
            resolver,
            artifacts,
        }
    }

    /// Ingest one feed. Only an unreadable feed is an error; entry
    /// failures are counted and logged.
    pub async fn ingest(&self, url: &str) -> Result<IngestReport> {
        tracing::info!(url = %url, "Fetching feed");
        let feed = self.source.read(url).await?;

        let mut report = IngestReport {
            subscription_name: feed.subscription_name.clone(),
            malformed: feed.malformed.is_some(),
            ..Default::default()
        };

        for entry in &feed.entries {
            match self.process_entry(&feed.subscription_name, entry).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        url = %url,
                        title = entry.title.as_deref().unwrap_or_default(),
                        error = %e,
                        "Entry not ingested"
                    );
                }
            }
        }

        tracing::info!(
            url = %url,
            subscription = %report.subscription_name,
            created = report.created,
            repaired = report.repaired,
            unchanged = report.unchanged,
            deferred = report.deferred,
            skipped = report.skipped,
            failed = report.failed,
            "Feed ingested"
        );

        Ok(report)
    }

    /// Insert-then-reconcile for one entry. The `dedup_key` uniqueness
    /// constraint decides which writer resolves content.
    pub async fn process_entry(&self, subscription_name: &str, entry: &RawEntry) -> Result<EntryOutcome> {
        let Some(normalized) = normalize(entry, Utc::now()) else {
            tracing::debug!(
                title = entry.title.as_deref().unwrap_or_default(),
                "Entry has no id or link, skipping"
            );
            return Ok(EntryOutcome::Skipped);
        };

        if let Some(row) = self.store.find_by_key(&normalized.dedup_key).await? {
            let row = self.backfill_subscription(row, subscription_name).await?;
            if self.has_content(&row).await? {
                return Ok(EntryOutcome::Unchanged);
            }

            tracing::info!(key = %row.dedup_key, "Markdown artifact missing, repairing");
            self.store_content(&row, entry).await?;
            return Ok(EntryOutcome::Repaired);
        }

        let draft = NewArticle {
            dedup_key: normalized.dedup_key,
            link: normalized.link,
            title: normalized.title,
            subscription_name: subscription_name.to_string(),
            publish_date: normalized.publish_date,
        };

        match self.store.insert_if_absent(draft).await? {
            InsertOutcome::Inserted(row) => {
                self.store_content(&row, entry).await?;
                Ok(EntryOutcome::Created)
            }
            InsertOutcome::Conflict(row) => {
                // The winner resolves content; repair is left to a later run
                if self.has_content(&row).await? {
                    Ok(EntryOutcome::Unchanged)
                } else {
                    tracing::debug!(key = %row.dedup_key, "Lost insert race, deferring to winner");
                    Ok(EntryOutcome::Deferred)
                }
            }
        }
    }

    async fn backfill_subscription(&self, mut row: Article, subscription_name: &str) -> Result<Article> {
        if row.subscription_name.trim().is_empty() && !subscription_name.trim().is_empty() {
            self.store
                .update(row.id, ArticleUpdate::SubscriptionName(subscription_name.to_string()))
                .await?;
            row.subscription_name = subscription_name.to_string();
        }
        Ok(row)
    }

    async fn has_content(&self, row: &Article) -> Result<bool> {
        self.artifacts
            .markdown_exists(&ArtifactKey::for_article(row))
            .await
    }

    async fn store_content(&self, row: &Article, entry: &RawEntry) -> Result<()> {
        let resolved = self
            .resolver
            .resolve(&row.link, entry.content.as_deref())
            .await?;

        let key = ArtifactKey::for_article(row);
        self.artifacts.save_html(&key, &resolved.html).await?;
        // Markdown last: its presence marks resolution as complete
        self.artifacts.save_markdown(&key, &resolved.markdown).await?;

        tracing::debug!(key = %row.dedup_key, origin = ?resolved.origin, "Stored article content");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteArticleStore;
    use crate::error::AppError;
    use crate::models::ParsedFeed;
    use crate::services::PageFetcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticFeed(ParsedFeed);

    #[async_trait]
    impl FeedSource for StaticFeed {
        async fn read(&self, _url: &str) -> Result<ParsedFeed> {
            Ok(self.0.clone())
        }
    }

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                return Err(AppError::ContentUnavailable(url.to_string()));
            }
            Ok(format!("<p>page for {url}</p>"))
        }
    }

    fn entry(id: &str, link: &str, content: Option<&str>) -> RawEntry {
        RawEntry {
            id: Some(id.to_string()),
            link: Some(link.to_string()),
            title: Some(format!("Title {id}")),
            content: content.map(str::to_string),
            ..Default::default()
        }
    }

    async fn pipeline(
        entries: Vec<RawEntry>,
    ) -> (IngestionPipeline, Arc<SqliteArticleStore>, Arc<ArtifactStore>, Arc<CountingFetcher>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteArticleStore::open_in_memory().await.unwrap());
        let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let feed = ParsedFeed {
            subscription_name: "Example Blog".to_string(),
            entries,
            malformed: None,
        };
        let pipeline = IngestionPipeline::new(
            Arc::new(StaticFeed(feed)),
            store.clone(),
            Arc::new(ContentResolver::new(fetcher.clone())),
            artifacts.clone(),
        );
        (pipeline, store, artifacts, fetcher, dir)
    }

    #[tokio::test]
    async fn one_failing_entry_does_not_stop_the_feed() {
        let (pipeline, store, _artifacts, fetcher, _dir) = pipeline(vec![
            entry("1", "https://example.com/broken", None),
            entry("2", "https://example.com/ok", None),
            entry("3", "https://example.com/embedded", Some("<p>inline body</p>")),
            RawEntry {
                title: Some("no identity".into()),
                ..Default::default()
            },
        ])
        .await;

        let report = pipeline.ingest("https://example.com/feed").await.unwrap();

        assert_eq!(report.subscription_name, "Example Blog");
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 4);
        // Embedded content never touches the network
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        // The failed entry keeps its row for a later repair
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_markdown_triggers_repair() {
        let (pipeline, store, artifacts, _fetcher, _dir) =
            pipeline(vec![entry("1", "https://example.com/a", Some("<p>body</p>"))]).await;

        pipeline.ingest("feed").await.unwrap();
        let row = store.find_by_key("1").await.unwrap().unwrap();
        let key = ArtifactKey::for_article(&row);
        std::fs::remove_file(artifacts.markdown_path(&key)).unwrap();

        let report = pipeline.ingest("feed").await.unwrap();

        assert_eq!(report.repaired, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(artifacts.read_markdown(&key).await.unwrap(), "body");
    }

    #[tokio::test]
    async fn backfills_empty_subscription_name() {
        let (pipeline, store, artifacts, _fetcher, _dir) =
            pipeline(vec![entry("1", "https://example.com/a", Some("<p>body</p>"))]).await;

        let row = store
            .insert_if_absent(NewArticle {
                dedup_key: "1".into(),
                link: "https://example.com/a".into(),
                title: "Title 1".into(),
                subscription_name: String::new(),
                publish_date: Utc::now(),
            })
            .await
            .unwrap();
        assert!(row.inserted());

        let outcome = pipeline
            .process_entry(
                "Example Blog",
                &entry("1", "https://example.com/a", Some("<p>body</p>")),
            )
            .await
            .unwrap();

        let row = store.find_by_key("1").await.unwrap().unwrap();
        assert_eq!(row.subscription_name, "Example Blog");
        assert_eq!(outcome, EntryOutcome::Repaired);
        assert!(artifacts
            .markdown_exists(&ArtifactKey::for_article(&row))
            .await
            .unwrap());
    }
}
