mod repository;
mod schema;

pub use repository::{ArticleStore, SqliteArticleStore};
