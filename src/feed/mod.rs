mod normalizer;
mod reader;

pub use normalizer::{normalize, DEFAULT_TITLE};
pub use reader::{FeedReader, FeedSource, UNKNOWN_SUBSCRIPTION};
