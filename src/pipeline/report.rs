use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::ai::AnalysisClient;
use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::{Article, DigestItem};
use crate::notify::NotifierSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    pub candidates: usize,
    pub channels_delivered: usize,
    pub marked_sent: usize,
}

/// Composes the daily digest from analysed articles and delivers it.
pub struct Reporter {
    store: Arc<dyn ArticleStore>,
    client: Arc<AnalysisClient>,
    notifiers: Arc<NotifierSet>,
    min_score: u8,
}

impl Reporter {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        client: Arc<AnalysisClient>,
        notifiers: Arc<NotifierSet>,
        min_score: u8,
    ) -> Self {
        Self {
            store,
            client,
            notifiers,
            min_score,
        }
    }

    pub async fn send_daily_report(&self) -> Result<ReportOutcome> {
        let articles = self.store.report_candidates(self.min_score).await?;
        let mut outcome = ReportOutcome {
            candidates: articles.len(),
            ..Default::default()
        };

        if articles.is_empty() {
            tracing::info!(min_score = self.min_score, "No new high-quality articles to report");
            return Ok(outcome);
        }
        if self.notifiers.is_empty() {
            tracing::warn!("No notification channels configured, digest not sent");
            return Ok(outcome);
        }

        tracing::info!(count = articles.len(), "Composing daily digest");

        let items: Vec<DigestItem> = articles
            .iter()
            .map(|a| DigestItem {
                title: a.title.clone(),
                summary: a.summary.clone(),
            })
            .collect();
        let insight = self.client.summarize_digest(&items).await;

        let today = Local::now().date_naive();
        let body = compose_digest(today, &insight, &articles);
        let title = format!("Daily digest {}", today.format("%Y-%m-%d"));

        outcome.channels_delivered = self.notifiers.deliver(&title, &body).await;
        if outcome.channels_delivered == 0 {
            tracing::error!("Digest delivery failed on every channel, articles stay unsent");
            return Ok(outcome);
        }

        let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
        outcome.marked_sent = self.store.mark_sent(&ids).await?;
        tracing::info!(
            sent = outcome.marked_sent,
            channels = outcome.channels_delivered,
            "Daily digest delivered"
        );

        Ok(outcome)
    }
}

/// Render the digest body as markdown.
pub fn compose_digest(date: NaiveDate, insight: &str, articles: &[Article]) -> String {
    let mut lines = vec![
        format!("## Daily digest {}", date.format("%Y-%m-%d")),
        String::new(),
        format!("> **Overview**: {}", insight.replace('\n', "\n> ")),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for article in articles {
        lines.push(format!(
            "### [{}]({}) (score: {})",
            article.title, article.link, article.score
        ));
        lines.push(article.summary.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}
