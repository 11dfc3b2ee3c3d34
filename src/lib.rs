//! RSS ingestion agent: feeds are deduplicated into SQLite, article
//! content is stored as cleaned markdown, scored by an LLM in batches and
//! the best articles are pushed as a daily digest.

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod services;

pub use app::App;
pub use config::Config;
pub use error::{AppError, Result};
