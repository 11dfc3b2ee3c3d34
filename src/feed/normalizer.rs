use chrono::{DateTime, Utc};

use crate::models::{NormalizedEntry, RawEntry};

/// Title used when an entry has none.
pub const DEFAULT_TITLE: &str = "No Title";

/// Resolve the identity and metadata of one raw entry.
///
/// Returns `None` when the entry has no usable dedup key or link.
pub fn normalize(entry: &RawEntry, now: DateTime<Utc>) -> Option<NormalizedEntry> {
    let dedup_key = entry
        .id
        .as_deref()
        .and_then(clean)
        .or_else(|| entry.guid.as_deref().and_then(clean))?;

    let link = entry
        .link
        .as_deref()
        .and_then(clean)
        .or_else(|| {
            entry
                .links
                .iter()
                .find(|l| l.rel.as_deref() == Some("alternate"))
                .and_then(|l| clean(&l.href))
        })
        .or_else(|| entry.links.first().and_then(|l| clean(&l.href)))?;

    let title = entry
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    // "updated" carries a time of day that "published" often lacks
    let publish_date = entry.updated.or(entry.published).unwrap_or(now);

    Some(NormalizedEntry {
        dedup_key,
        link,
        title,
        publish_date,
    })
}

fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim_matches(|c: char| c.is_whitespace() || c == '`');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
