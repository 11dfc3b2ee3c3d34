use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};

use super::{chunk_message, Notifier};

/// DingTalk caps markdown messages at 20,000 bytes.
const MAX_MESSAGE_BYTES: usize = 18_000;

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// DingTalk custom-robot webhook.
pub struct DingTalkNotifier {
    client: Client,
    webhook_url: String,
}

impl DingTalkNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    async fn post(&self, title: &str, text: &str) -> Result<()> {
        let payload = json!({
            "msgtype": "markdown",
            "markdown": { "title": title, "text": text },
        });

        let response = self.client.post(&self.webhook_url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notify(format!("DingTalk HTTP {status}: {body}")));
        }

        // The webhook answers 200 even for rejected messages
        let result: WebhookResponse = response.json().await?;
        if result.errcode != 0 {
            return Err(AppError::Notify(format!(
                "DingTalk error {}: {}",
                result.errcode, result.errmsg
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for DingTalkNotifier {
    fn name(&self) -> &'static str {
        "dingtalk"
    }

    async fn deliver(&self, title: &str, body: &str) -> Result<()> {
        let chunks = chunk_message(body, MAX_MESSAGE_BYTES);
        let total = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            let part_title = if total > 1 {
                format!("{title} ({}/{total})", i + 1)
            } else {
                title.to_string()
            };
            self.post(&part_title, chunk).await?;
        }

        Ok(())
    }
}
