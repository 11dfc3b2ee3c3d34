mod content;
mod content_fetcher;
mod markdown;
mod storage;

pub use content::{ContentOrigin, ContentResolver, ResolvedContent};
pub use content_fetcher::{HttpPageFetcher, PageFetcher, FETCH_TIMEOUT};
pub use markdown::{clean_text, html_to_markdown};
pub use storage::{sanitize_filename, ArtifactKey, ArtifactStore};
