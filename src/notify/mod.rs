mod dingtalk;
mod telegram;

pub use dingtalk::DingTalkNotifier;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

use crate::config::NotifyConfig;
use crate::error::Result;

/// A delivery channel for the daily digest.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver a markdown message. Implementations split bodies that
    /// exceed their channel's size limit.
    async fn deliver(&self, title: &str, body: &str) -> Result<()>;
}

/// Every configured notifier, in configuration order.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build the channels listed in `config.channels`. Channels that are
    /// unknown or missing credentials are skipped with a warning.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        for channel in &config.channels {
            match channel.trim().to_lowercase().as_str() {
                "dingtalk" => match &config.dingtalk_webhook {
                    Some(webhook) => notifiers.push(Box::new(DingTalkNotifier::new(webhook.clone())?)),
                    None => tracing::warn!("DingTalk webhook not configured, channel disabled"),
                },
                "telegram" => match (&config.telegram_bot_token, &config.telegram_chat_id) {
                    (Some(token), Some(chat_id)) => notifiers.push(Box::new(
                        TelegramNotifier::new(token.clone(), chat_id.clone())?,
                    )),
                    _ => tracing::warn!("Telegram token or chat id not configured, channel disabled"),
                },
                other => tracing::warn!(channel = %other, "Unknown notification channel"),
            }
        }

        Ok(Self { notifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Deliver to every channel and return how many accepted the message.
    /// One channel failing does not stop the others.
    pub async fn deliver(&self, title: &str, body: &str) -> usize {
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.deliver(title, body).await {
                Ok(()) => {
                    tracing::info!(channel = notifier.name(), "Notification sent");
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!(channel = notifier.name(), error = %e, "Notification failed");
                }
            }
        }
        delivered
    }
}

/// Split `text` into pieces of at most `max_bytes`, breaking on line
/// boundaries where possible and on char boundaries otherwise.
pub fn chunk_message(text: &str, max_bytes: usize) -> Vec<String> {
    let max_bytes = max_bytes.max(4);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        let needed = if current.is_empty() { line.len() } else { line.len() + 1 };
        if current.len() + needed <= max_bytes {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        let mut rest = line;
        while rest.len() > max_bytes {
            let mut cut = max_bytes;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        current.push_str(rest);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
