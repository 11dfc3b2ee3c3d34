use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{AppError, Result};

use super::{chunk_message, Notifier};

const API_BASE: &str = "https://api.telegram.org";
/// Telegram rejects texts over 4096 characters.
const MAX_MESSAGE_BYTES: usize = 4_000;

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            token,
            chat_id,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        );
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notify(format!("Telegram HTTP {status}: {body}")));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, title: &str, body: &str) -> Result<()> {
        let message = format!("*{title}*\n\n{body}");
        for chunk in chunk_message(&message, MAX_MESSAGE_BYTES) {
            self.send(&chunk).await?;
        }
        Ok(())
    }
}
