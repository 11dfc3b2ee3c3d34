use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{ParsedFeed, RawEntry, RawLink};

/// Subscription name used when a feed carries no title.
pub const UNKNOWN_SUBSCRIPTION: &str = "Unknown Subscription";

/// Anything that can turn a feed URL into a parsed feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn read(&self, url: &str) -> Result<ParsedFeed>;
}

pub struct FeedReader {
    client: Client,
}

impl FeedReader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("rss-digest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Parse a feed document. Falls back to a repaired copy when the
    /// document as a whole is not well formed.
    pub fn parse(bytes: &[u8]) -> Result<ParsedFeed> {
        match strict_parse(bytes) {
            Ok(feed) => Ok(convert_feed(feed, None)),
            Err(err) => {
                let text = String::from_utf8_lossy(bytes);
                let Some(repaired) = repair_document(&text) else {
                    return Err(err.into());
                };
                match strict_parse(repaired.as_bytes()) {
                    Ok(feed) => Ok(convert_feed(feed, Some(err.to_string()))),
                    Err(e) => {
                        tracing::debug!("Repaired feed still unparseable: {}", e);
                        Err(err.into())
                    }
                }
            }
        }
    }
}

/// Parse without feed-rs' id synthesis, so an entry without a guid or id
/// keeps an empty id instead of a hash of its link or a random uuid.
fn strict_parse(bytes: &[u8]) -> parser::ParseFeedResult<Feed> {
    parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)
}

#[async_trait]
impl FeedSource for FeedReader {
    async fn read(&self, url: &str) -> Result<ParsedFeed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::FeedUnavailable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::FeedUnavailable(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        let feed = Self::parse(&bytes[..])?;

        if let Some(reason) = &feed.malformed {
            tracing::warn!(url = %url, reason = %reason, "Feed malformed, recovered {} entries", feed.entries.len());
        }

        Ok(feed)
    }
}

fn convert_feed(feed: Feed, malformed: Option<String>) -> ParsedFeed {
    let subscription_name = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_SUBSCRIPTION.to_string());

    ParsedFeed {
        subscription_name,
        entries: feed.entries.into_iter().map(convert_entry).collect(),
        malformed,
    }
}

fn convert_entry(entry: Entry) -> RawEntry {
    // Try content first, then fall back to summary
    let content = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()));

    // RSS <link> has no rel; Atom marks the primary one as alternate
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.is_none())
        .map(|l| l.href.clone());

    RawEntry {
        id: Some(entry.id).filter(|id| !id.trim().is_empty()),
        guid: None,
        link,
        links: entry
            .links
            .into_iter()
            .map(|l| RawLink {
                href: l.href,
                rel: l.rel,
            })
            .collect(),
        title: entry.title.map(|t| t.content),
        updated: entry.updated,
        published: entry.published,
        content,
    }
}

static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("valid regex"));

/// Cut a broken document after its last complete item, close it and drop
/// characters XML does not allow. `None` when there is no complete item.
fn repair_document(text: &str) -> Option<String> {
    let (close_tag, tail) = if text.contains("<entry") {
        ("</entry>", "</feed>")
    } else if text.contains("<rdf:RDF") {
        ("</item>", "</rdf:RDF>")
    } else {
        ("</item>", "</channel></rss>")
    };

    let end = text.rfind(close_tag)? + close_tag.len();
    let document = format!("{}{}", &text[..end], tail);
    Some(CONTROL_CHARS.replace_all(&document, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::normalize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://example.com/</link>
    <item>
      <title>First post</title>
      <link>https://example.com/first</link>
      <guid>https://example.com/?p=1</guid>
      <pubDate>Mon, 06 Jan 2025 08:30:00 GMT</pubDate>
      <description><![CDATA[<p>Hello <b>world</b></p>]]></description>
    </item>
    <item>
      <title>Second post</title>
      <link>https://example.com/second</link>
      <guid>https://example.com/?p=2</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_entries_in_order() {
        let feed = FeedReader::parse(RSS.as_bytes()).unwrap();

        assert_eq!(feed.subscription_name, "Example Blog");
        assert!(feed.malformed.is_none());
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title.as_deref(), Some("First post"));
        assert_eq!(first.id.as_deref(), Some("https://example.com/?p=1"));
        assert_eq!(
            first.links.first().map(|l| l.href.as_str()),
            Some("https://example.com/first")
        );
        assert!(first.published.is_some());
        assert!(first.content.as_deref().unwrap().contains("<b>world</b>"));
        assert_eq!(feed.entries[1].title.as_deref(), Some("Second post"));
    }

    #[test]
    fn missing_feed_title_uses_sentinel() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>Only</title><link>https://example.com/only</link><guid>only</guid></item>
        </channel></rss>"#;

        let feed = FeedReader::parse(xml.as_bytes()).unwrap();
        assert_eq!(feed.subscription_name, UNKNOWN_SUBSCRIPTION);
    }

    #[test]
    fn recovers_complete_items_from_truncated_feed() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Broken Feed</title>
<item><title>A</title><link>https://example.com/a</link><guid>a</guid></item>
<item><title>B</title><link>https://example.com/b</link><guid>b</guid></item>
<item><title>D</ti"#;

        let feed = FeedReader::parse(xml.as_bytes()).unwrap();

        assert!(feed.malformed.is_some());
        assert_eq!(feed.subscription_name, "Broken Feed");
        let titles: Vec<_> = feed.entries.iter().filter_map(|e| e.title.clone()).collect();
        assert_eq!(titles, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn repair_strips_control_characters() {
        let xml = "<rss version=\"2.0\"><channel><title>Noisy</title>\
<item><title>A\u{1}</title><link>https://example.com/a</link><guid>a</guid></item>\
<item><title>B";

        let feed = FeedReader::parse(xml.as_bytes()).unwrap();

        assert!(feed.malformed.is_some());
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn entry_without_guid_gets_no_identifier() {
        let xml = r#"<rss version="2.0"><channel><title>Blog</title>
            <item><title>Linked</title><link>https://example.com/linked</link></item>
            <item><title>Bare</title></item>
        </channel></rss>"#;

        let feed = FeedReader::parse(xml.as_bytes()).unwrap();

        assert_eq!(feed.entries.len(), 2);
        for entry in &feed.entries {
            assert_eq!(entry.id, None);
            assert!(normalize(entry, chrono::Utc::now()).is_none());
        }
    }

    #[test]
    fn unrecoverable_document_is_an_error() {
        assert!(FeedReader::parse(b"this is not a feed").is_err());
    }

    #[tokio::test]
    async fn non_success_status_is_feed_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let reader = FeedReader::new().unwrap();
        let err = reader
            .read(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::FeedUnavailable(_)));
    }

    #[tokio::test]
    async fn reads_feed_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let reader = FeedReader::new().unwrap();
        let feed = reader
            .read(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap();

        assert_eq!(feed.entries.len(), 2);
    }
}
