use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Content unavailable for {0}")]
    ContentUnavailable(String),

    #[error("AI API error: {0}")]
    AiApi(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
