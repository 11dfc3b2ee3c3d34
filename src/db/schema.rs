pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dedup_key TEXT NOT NULL UNIQUE,
    link TEXT NOT NULL,
    title TEXT NOT NULL,
    subscription_name TEXT NOT NULL DEFAULT '',
    publish_date TEXT NOT NULL,
    score INTEGER NOT NULL DEFAULT 0 CHECK (score BETWEEN 0 AND 10),
    summary TEXT NOT NULL DEFAULT '',
    is_ad INTEGER NOT NULL DEFAULT 0,
    is_processed INTEGER NOT NULL DEFAULT 0,
    is_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_subscription_name ON articles(subscription_name);
CREATE INDEX IF NOT EXISTS idx_articles_link ON articles(link);
CREATE INDEX IF NOT EXISTS idx_articles_pending ON articles(is_processed, created_at);
CREATE INDEX IF NOT EXISTS idx_articles_report ON articles(is_sent, is_processed, score);
"#;
