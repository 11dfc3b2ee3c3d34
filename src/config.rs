use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chrono::NaiveTime;

use crate::ai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::{AppError, Result};

const APP_DIR: &str = "rss-digest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    #[serde(default)]
    pub feeds: Vec<String>,

    #[serde(default = "default_min_score")]
    pub min_score: u8,

    /// Local time of the daily digest, `HH:MM`.
    #[serde(default = "default_push_time")]
    pub push_time: String,

    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_minutes: u32,

    #[serde(default = "default_batch_size")]
    pub analysis_batch_size: usize,

    #[serde(default = "default_cleanup_days")]
    pub cleanup_after_days: u64,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Enabled channels: `dingtalk`, `telegram`.
    #[serde(default)]
    pub channels: Vec<String>,

    pub dingtalk_webhook: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_db_path() -> String {
    data_dir().join("articles.db").to_string_lossy().to_string()
}

fn default_storage_dir() -> String {
    data_dir().join("articles").to_string_lossy().to_string()
}

fn default_min_score() -> u8 {
    8
}

fn default_push_time() -> String {
    "09:00".to_string()
}

fn default_fetch_interval() -> u32 {
    60
}

fn default_batch_size() -> usize {
    10
}

fn default_cleanup_days() -> u64 {
    30
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage_dir: default_storage_dir(),
            feeds: Vec::new(),
            min_score: default_min_score(),
            push_time: default_push_time(),
            fetch_interval_minutes: default_fetch_interval(),
            analysis_batch_size: default_batch_size(),
            cleanup_after_days: default_cleanup_days(),
            ai: AiConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_ai_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), writing defaults on
    /// first run, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            tracing::info!(path = %config_path.display(), "Wrote default configuration");
            config
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Overlay deployment values. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(urls) = get("RSS_URLS") {
            self.feeds = split_list(&urls);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.ai.model = model;
        }
        if let Some(channels) = get("NOTIFICATION_CHANNELS") {
            self.notify.channels = split_list(&channels);
        }
        if let Some(webhook) = get("DING_WEBHOOK") {
            self.notify.dingtalk_webhook = Some(webhook);
        }
        if let Some(token) = get("TG_BOT_TOKEN") {
            self.notify.telegram_bot_token = Some(token);
        }
        if let Some(chat_id) = get("TG_CHAT_ID") {
            self.notify.telegram_chat_id = Some(chat_id);
        }
        if let Some(score) = get("MIN_SCORE") {
            self.min_score = score
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("MIN_SCORE is not a number: {score}")))?;
        }
        if let Some(time) = get("PUSH_TIME") {
            self.push_time = time.trim().to_string();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_score > 10 {
            return Err(AppError::Config(format!(
                "min_score must be between 0 and 10, got {}",
                self.min_score
            )));
        }
        if self.fetch_interval_minutes == 0 {
            return Err(AppError::Config(
                "fetch_interval_minutes must be positive".to_string(),
            ));
        }
        self.push_time()?;
        Ok(())
    }

    pub fn push_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.push_time.trim(), "%H:%M")
            .map_err(|_| AppError::Config(format!("push_time must be HH:MM, got {}", self.push_time)))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            feeds = ["https://example.com/feed.xml"]
            min_score = 7

            [notify]
            channels = ["telegram"]
            "#,
        )
        .unwrap();

        assert_eq!(config.feeds, vec!["https://example.com/feed.xml"]);
        assert_eq!(config.min_score, 7);
        assert_eq!(config.push_time, "09:00");
        assert_eq!(config.analysis_batch_size, 10);
        assert_eq!(config.ai.max_attempts, 3);
        assert_eq!(config.ai.model, DEFAULT_MODEL);
        assert_eq!(config.notify.channels, vec!["telegram"]);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("RSS_URLS", "https://a.example/rss, https://b.example/atom ,"),
                ("OPENAI_API_KEY", "sk-env"),
                ("NOTIFICATION_CHANNELS", "dingtalk,telegram"),
                ("MIN_SCORE", "6"),
                ("PUSH_TIME", "18:30"),
                ("TG_CHAT_ID", ""),
            ]))
            .unwrap();

        assert_eq!(
            config.feeds,
            vec!["https://a.example/rss", "https://b.example/atom"]
        );
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.notify.channels, vec!["dingtalk", "telegram"]);
        assert_eq!(config.min_score, 6);
        assert_eq!(
            config.push_time().unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
        assert_eq!(config.notify.telegram_chat_id, None);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("MIN_SCORE", "high")])).is_err());

        config.push_time = "9 o'clock".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.min_score = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();

        assert!(path.exists());
        let reloaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.storage_dir, config.storage_dir);
        assert_eq!(reloaded.fetch_interval_minutes, 60);
    }
}
