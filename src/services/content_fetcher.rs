use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Retrieves the HTML of an article page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, article_url: &str) -> Result<String> {
        if Url::parse(article_url).is_err() {
            return Err(AppError::ContentUnavailable(format!(
                "{article_url}: invalid URL"
            )));
        }

        let response = self
            .client
            .get(article_url)
            .send()
            .await
            .map_err(|e| AppError::ContentUnavailable(format!("{article_url}: {e}")))?;

        if response.status() != StatusCode::OK {
            tracing::debug!("Failed to fetch {}: {}", article_url, response.status());
            return Err(AppError::ContentUnavailable(format!(
                "{article_url}: HTTP {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_page_with_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .and(header_regex("user-agent", "Mozilla/5.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>body</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new().unwrap();
        let html = fetcher
            .fetch(&format!("{}/post", server.uri()))
            .await
            .unwrap();

        assert_eq!(html, "<p>body</p>");
    }

    #[tokio::test]
    async fn non_200_is_content_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new().unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ContentUnavailable(_)));
    }

    #[tokio::test]
    async fn invalid_url_is_content_unavailable() {
        let fetcher = HttpPageFetcher::new().unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, AppError::ContentUnavailable(_)));
    }
}
