mod analysis;
mod client;
mod prompts;

pub use analysis::{
    parse_analysis, truncate_chars, AnalysisClient, INSIGHT_FAILED, MAX_CONTENT_CHARS,
    MAX_DIGEST_CHARS, NO_ARTICLES_INSIGHT,
};
pub use client::{ChatBackend, ChatRequest, OpenAiChat, DEFAULT_BASE_URL, DEFAULT_MODEL};
