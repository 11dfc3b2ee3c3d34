use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Analysis;

/// Persistent record of one feed entry and its processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub dedup_key: String,
    pub link: String,
    pub title: String,
    pub subscription_name: String,
    pub publish_date: DateTime<Utc>,
    pub score: u8,
    pub summary: String,
    pub is_ad: bool,
    pub is_processed: bool,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal "downloaded" row inserted by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub dedup_key: String,
    pub link: String,
    pub title: String,
    pub subscription_name: String,
    pub publish_date: DateTime<Utc>,
}

/// Field updates applied to an existing row.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleUpdate {
    /// Backfill an empty subscription name.
    SubscriptionName(String),
    /// Store the analysis result and mark the row processed.
    Analyzed(Analysis),
}

/// Result of an insert-if-absent attempt. Both variants carry the row
/// that now owns the dedup key.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Article),
    /// Another writer already holds the key; this is its row.
    Conflict(Article),
}

impl InsertOutcome {
    pub fn row(&self) -> &Article {
        match self {
            InsertOutcome::Inserted(row) | InsertOutcome::Conflict(row) => row,
        }
    }

    pub fn inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}
