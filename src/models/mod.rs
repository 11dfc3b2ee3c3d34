mod analysis;
mod article;
mod entry;

pub use analysis::{Analysis, DigestItem, ANALYSIS_FAILED_SUMMARY};
pub use article::{Article, ArticleUpdate, InsertOutcome, NewArticle};
pub use entry::{NormalizedEntry, ParsedFeed, RawEntry, RawLink};
