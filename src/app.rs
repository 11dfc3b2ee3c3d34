use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::ai::{AnalysisClient, OpenAiChat};
use crate::config::Config;
use crate::db::{ArticleStore, SqliteArticleStore};
use crate::error::{AppError, Result};
use crate::feed::FeedReader;
use crate::notify::NotifierSet;
use crate::pipeline::{
    AnalyzeReport, IngestReport, IngestionPipeline, PendingAnalyzer, ReportOutcome, Reporter,
};
use crate::retry::RetryPolicy;
use crate::services::{ArtifactStore, ContentResolver, HttpPageFetcher};

const MAX_CONCURRENT_FEEDS: usize = 5;

/// The wired-up pipeline and the jobs that drive it.
pub struct App {
    config: Config,
    artifacts: Arc<ArtifactStore>,
    ingestion: IngestionPipeline,
    // Absent when no API key is configured
    analyzer: Option<PendingAnalyzer>,
    reporter: Option<Reporter>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store: Arc<dyn ArticleStore> =
            Arc::new(SqliteArticleStore::open(&config.db_path).await?);
        let artifacts = Arc::new(ArtifactStore::new(&config.storage_dir)?);

        let resolver = Arc::new(ContentResolver::new(Arc::new(HttpPageFetcher::new()?)));
        let ingestion = IngestionPipeline::new(
            Arc::new(FeedReader::new()?),
            store.clone(),
            resolver,
            artifacts.clone(),
        );

        let client = match &config.ai.api_key {
            Some(key) => {
                let chat = OpenAiChat::new(
                    key.clone(),
                    &config.ai.base_url,
                    config.ai.model.clone(),
                    Duration::from_secs(config.ai.timeout_secs),
                )?;
                tracing::info!(model = %chat.model(), "Chat backend configured");
                let policy = RetryPolicy::default().with_max_attempts(config.ai.max_attempts);
                Some(Arc::new(AnalysisClient::new(Arc::new(chat), policy)))
            }
            None => {
                tracing::warn!("OpenAI API key not configured, analysis and reports disabled");
                None
            }
        };

        let notifiers = Arc::new(NotifierSet::from_config(&config.notify)?);

        let analyzer = client.as_ref().map(|client| {
            PendingAnalyzer::new(store.clone(), artifacts.clone(), client.clone())
                .with_batch_size(config.analysis_batch_size)
        });
        let reporter = client.map(|client| {
            Reporter::new(store.clone(), client, notifiers.clone(), config.min_score)
        });

        Ok(Self {
            config,
            artifacts,
            ingestion,
            analyzer,
            reporter,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest every configured feed (or just `url`), then analyse one batch.
    pub async fn fetch(&self, url: Option<&str>) -> Result<Vec<IngestReport>> {
        let urls: Vec<String> = match url {
            Some(url) => vec![url.to_string()],
            None => self.config.feeds.clone(),
        };

        if urls.is_empty() {
            tracing::warn!("No RSS URLs configured");
            return Ok(Vec::new());
        }

        let reports: Vec<IngestReport> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                match self.ingestion.ingest(&url).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        tracing::error!(url = %url, error = %e, "Feed failed");
                        None
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_FEEDS)
            .filter_map(|r| async { r })
            .collect()
            .await;

        self.analyze().await?;
        Ok(reports)
    }

    pub async fn analyze(&self) -> Result<Option<AnalyzeReport>> {
        match &self.analyzer {
            Some(analyzer) => analyzer.run_batch().await.map(Some),
            None => {
                tracing::warn!("Analysis skipped: no chat backend configured");
                Ok(None)
            }
        }
    }

    pub async fn report(&self) -> Result<Option<ReportOutcome>> {
        match &self.reporter {
            Some(reporter) => reporter.send_daily_report().await.map(Some),
            None => {
                tracing::warn!("Report skipped: no chat backend configured");
                Ok(None)
            }
        }
    }

    /// Remove artifacts older than `days` (default from config).
    pub async fn cleanup(&self, days: Option<u64>) -> Result<usize> {
        let days = days.unwrap_or(self.config.cleanup_after_days);
        let artifacts = self.artifacts.clone();

        let removed = tokio::task::spawn_blocking(move || artifacts.cleanup_older_than(days))
            .await
            .map_err(|e| AppError::Other(e.into()))??;

        tracing::info!(removed, days, "Artifact cleanup finished");
        Ok(removed)
    }

    /// Fetch, then report.
    pub async fn run(&self) -> Result<()> {
        self.fetch(None).await?;
        self.report().await?;
        Ok(())
    }
}
