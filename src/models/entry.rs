use chrono::{DateTime, Utc};

/// A link attached to a feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub href: String,
    pub rel: Option<String>,
}

/// One entry as it came out of the feed document, before normalisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub guid: Option<String>,
    /// The entry's primary link, when the format distinguishes one.
    pub link: Option<String>,
    pub links: Vec<RawLink>,
    pub title: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
    /// Embedded body (content, else summary/description).
    pub content: Option<String>,
}

/// Entry identity and metadata after fallback rules have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub dedup_key: String,
    pub link: String,
    pub title: String,
    pub publish_date: DateTime<Utc>,
}

/// A parsed feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub subscription_name: String,
    pub entries: Vec<RawEntry>,
    /// Set when strict parsing failed and entries were recovered.
    pub malformed: Option<String>,
}
