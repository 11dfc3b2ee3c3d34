use std::sync::Arc;

use crate::error::{AppError, Result};

use super::content_fetcher::PageFetcher;
use super::markdown::html_to_markdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
    Embedded,
    Fetched,
}

/// Article body ready to be persisted.
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    /// The HTML the markdown was produced from.
    pub html: String,
    pub markdown: String,
    pub origin: ContentOrigin,
}

/// Obtains an entry's body, embedded or fetched, as cleaned markdown.
pub struct ContentResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl ContentResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn resolve(&self, link: &str, embedded: Option<&str>) -> Result<ResolvedContent> {
        if let Some(html) = embedded.filter(|c| !c.trim().is_empty()) {
            let markdown = html_to_markdown(html);
            if !markdown.is_empty() {
                return Ok(ResolvedContent {
                    html: html.to_string(),
                    markdown,
                    origin: ContentOrigin::Embedded,
                });
            }
            // Embedded body was nothing but media or clutter; try the page
            tracing::debug!(link = %link, "Embedded content empty after cleaning, fetching page");
        }

        let html = self.fetcher.fetch(link).await?;
        let markdown = html_to_markdown(&html);
        if markdown.is_empty() {
            return Err(AppError::ContentUnavailable(format!(
                "{link}: page has no readable content"
            )));
        }

        Ok(ResolvedContent {
            html,
            markdown,
            origin: ContentOrigin::Fetched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFetcher {
        body: Option<String>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(body: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                body: body.map(str::to_string),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .clone()
                .ok_or_else(|| AppError::ContentUnavailable(url.to_string()))
        }
    }

    #[tokio::test]
    async fn embedded_content_skips_the_network() {
        let fetcher = StubFetcher::new(Some("<p>fetched</p>"));
        let resolver = ContentResolver::new(fetcher.clone());

        let resolved = resolver
            .resolve("https://example.com/a", Some("<p>embedded body</p>"))
            .await
            .unwrap();

        assert_eq!(resolved.origin, ContentOrigin::Embedded);
        assert_eq!(resolved.markdown, "embedded body");
        assert_eq!(resolved.html, "<p>embedded body</p>");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetches_when_nothing_is_embedded() {
        let fetcher = StubFetcher::new(Some("<html><body><h2>Title</h2><p>page</p></body></html>"));
        let resolver = ContentResolver::new(fetcher.clone());

        let resolved = resolver.resolve("https://example.com/a", None).await.unwrap();

        assert_eq!(resolved.origin, ContentOrigin::Fetched);
        assert_eq!(resolved.markdown, "## Title\n\npage");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn image_only_embedded_body_falls_back_to_fetch() {
        let fetcher = StubFetcher::new(Some("<p>full article</p>"));
        let resolver = ContentResolver::new(fetcher.clone());

        let resolved = resolver
            .resolve("https://example.com/a", Some(r#"<img src="https://x/y.png">"#))
            .await
            .unwrap();

        assert_eq!(resolved.origin, ContentOrigin::Fetched);
        assert_eq!(resolved.markdown, "full article");
    }

    #[tokio::test]
    async fn fetch_failure_and_empty_pages_are_unavailable() {
        let resolver = ContentResolver::new(StubFetcher::new(None));
        let err = resolver.resolve("https://example.com/a", None).await.unwrap_err();
        assert!(matches!(err, AppError::ContentUnavailable(_)));

        let resolver = ContentResolver::new(StubFetcher::new(Some("<script>x()</script>")));
        let err = resolver.resolve("https://example.com/a", None).await.unwrap_err();
        assert!(matches!(err, AppError::ContentUnavailable(_)));
    }
}
