use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, ArticleUpdate, InsertOutcome, NewArticle};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, dedup_key, link, title, subscription_name, publish_date, \
     score, summary, is_ad, is_processed, is_sent, created_at, updated_at";

/// System of record for article processing state.
///
/// Uniqueness of `dedup_key` is enforced by the storage engine; callers
/// never lock. `insert_if_absent` reports which writer won.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_key(&self, dedup_key: &str) -> Result<Option<Article>>;

    async fn insert_if_absent(&self, draft: NewArticle) -> Result<InsertOutcome>;

    async fn update(&self, id: i64, update: ArticleUpdate) -> Result<()>;

    /// Unprocessed rows, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<Article>>;

    /// Analysed, non-ad, unsent rows scoring at least `min_score`.
    async fn report_candidates(&self, min_score: u8) -> Result<Vec<Article>>;

    /// Flag delivered rows as sent. Unprocessed rows are never flagged.
    async fn mark_sent(&self, ids: &[i64]) -> Result<usize>;
}

pub struct SqliteArticleStore {
    conn: Connection,
}

impl SqliteArticleStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            // Concurrent writers wait for the lock instead of failing
            conn.busy_timeout(Duration::from_secs(10))?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn find_by_key(&self, dedup_key: &str) -> Result<Option<Article>> {
        let key = dedup_key.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE dedup_key = ?1"),
                        params![key],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    async fn insert_if_absent(&self, draft: NewArticle) -> Result<InsertOutcome> {
        let outcome = self
            .conn
            .call(move |conn| {
                let now = Utc::now();
                let inserted = conn.execute(
                    r#"INSERT INTO articles (dedup_key, link, title, subscription_name, publish_date, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                       ON CONFLICT(dedup_key) DO NOTHING"#,
                    params![
                        draft.dedup_key,
                        draft.link,
                        draft.title,
                        draft.subscription_name,
                        draft.publish_date,
                        now,
                    ],
                )?;

                // Either our row or the one the concurrent winner committed
                let row = conn.query_row(
                    &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE dedup_key = ?1"),
                    params![draft.dedup_key],
                    article_from_row,
                )?;

                Ok(if inserted == 1 {
                    InsertOutcome::Inserted(row)
                } else {
                    InsertOutcome::Conflict(row)
                })
            })
            .await?;
        Ok(outcome)
    }

    async fn update(&self, id: i64, update: ArticleUpdate) -> Result<()> {
        self.conn
            .call(move |conn| {
                let now = Utc::now();
                match update {
                    ArticleUpdate::SubscriptionName(name) => {
                        conn.execute(
                            "UPDATE articles SET subscription_name = ?1, updated_at = ?2 WHERE id = ?3",
                            params![name, now, id],
                        )?;
                    }
                    ArticleUpdate::Analyzed(analysis) => {
                        conn.execute(
                            r#"UPDATE articles
                               SET score = ?1, summary = ?2, is_ad = ?3, is_processed = 1, updated_at = ?4
                               WHERE id = ?5"#,
                            params![analysis.score.min(10), analysis.summary, analysis.is_ad, now, id],
                        )?;
                    }
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE is_processed = 0 \
                     ORDER BY created_at ASC, id ASC LIMIT ?1"
                ))?;
                let articles = stmt
                    .query_map(params![limit as i64], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn report_candidates(&self, min_score: u8) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles \
                     WHERE is_processed = 1 AND is_ad = 0 AND is_sent = 0 AND score >= ?1 \
                     ORDER BY score DESC, publish_date DESC"
                ))?;
                let articles = stmt
                    .query_map(params![min_score], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn mark_sent(&self, ids: &[i64]) -> Result<usize> {
        let ids = ids.to_vec();
        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut updated = 0;
                {
                    let mut stmt = tx.prepare(
                        "UPDATE articles SET is_sent = 1, updated_at = ?1 WHERE id = ?2 AND is_processed = 1",
                    )?;
                    let now = Utc::now();
                    for id in ids {
                        updated += stmt.execute(params![now, id])?;
                    }
                }
                tx.commit()?;
                Ok(updated)
            })
            .await?;
        Ok(updated)
    }
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        dedup_key: row.get(1)?,
        link: row.get(2)?,
        title: row.get(3)?,
        subscription_name: row.get(4)?,
        publish_date: row.get(5)?,
        score: row.get(6)?,
        summary: row.get(7)?,
        is_ad: row.get(8)?,
        is_processed: row.get(9)?,
        is_sent: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
