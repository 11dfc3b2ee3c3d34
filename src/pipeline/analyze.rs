use std::io::ErrorKind;
use std::sync::Arc;

use crate::ai::AnalysisClient;
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::models::{Article, ArticleUpdate};
use crate::services::{ArtifactKey, ArtifactStore};

pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeReport {
    pub scanned: usize,
    pub analyzed: usize,
    /// Rows that received the sentinel after every attempt failed.
    pub exhausted: usize,
    /// Rows whose markdown artifact was gone; left unprocessed.
    pub missing_artifact: usize,
    pub failed: usize,
}

/// Moves "downloaded" rows to "analyzed", a batch at a time.
pub struct PendingAnalyzer {
    store: Arc<dyn ArticleStore>,
    artifacts: Arc<ArtifactStore>,
    client: Arc<AnalysisClient>,
    batch_size: usize,
}

impl PendingAnalyzer {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        artifacts: Arc<ArtifactStore>,
        client: Arc<AnalysisClient>,
    ) -> Self {
        Self {
            store,
            artifacts,
            client,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn run_batch(&self) -> Result<AnalyzeReport> {
        let pending = self.store.pending(self.batch_size).await?;
        let mut report = AnalyzeReport {
            scanned: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            tracing::debug!("No pending articles");
            return Ok(report);
        }

        tracing::info!(count = pending.len(), "Analyzing pending articles");

        for article in &pending {
            match self.analyze_one(article).await {
                Ok(true) => {
                    report.analyzed += 1;
                    report.exhausted += 1;
                }
                Ok(false) => report.analyzed += 1,
                Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    report.missing_artifact += 1;
                    tracing::warn!(
                        key = %article.dedup_key,
                        title = %article.title,
                        "Markdown artifact missing, leaving article unprocessed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(key = %article.dedup_key, error = %e, "Analysis failed");
                }
            }
        }

        tracing::info!(
            analyzed = report.analyzed,
            exhausted = report.exhausted,
            missing = report.missing_artifact,
            failed = report.failed,
            "Analysis batch finished"
        );

        Ok(report)
    }

    /// Returns whether the retry budget was exhausted.
    async fn analyze_one(&self, article: &Article) -> Result<bool> {
        let key = ArtifactKey::for_article(article);
        let content = self.artifacts.read_markdown(&key).await?;

        let result = self.client.analyze(&article.title, &content).await;
        let analysis = result.value;

        if !analysis.summary.is_empty() {
            if let Err(e) = self.artifacts.save_summary(&key, &analysis.summary).await {
                tracing::warn!(key = %article.dedup_key, error = %e, "Failed to save summary artifact");
            }
        }

        tracing::debug!(
            key = %article.dedup_key,
            score = analysis.score,
            is_ad = analysis.is_ad,
            attempts = result.attempts,
            "Article analyzed"
        );

        self.store
            .update(article.id, ArticleUpdate::Analyzed(analysis))
            .await?;

        Ok(result.exhausted)
    }
}
