use std::fmt::Write;
use std::sync::Arc;

use serde_json::Value;

use crate::models::{Analysis, DigestItem};
use crate::retry::{retry_until, Retried, RetryPolicy};

use super::client::{ChatBackend, ChatRequest};
use super::prompts;

/// Upstream context limits, in characters.
pub const MAX_CONTENT_CHARS: usize = 30_000;
pub const MAX_DIGEST_CHARS: usize = 50_000;

pub const NO_ARTICLES_INSIGHT: &str = "No high-scoring articles today.";
pub const INSIGHT_FAILED: &str = "Today's overview could not be generated.";

/// Scores and summarises articles, and writes the digest overview.
pub struct AnalysisClient {
    backend: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Analyse one article. Unusable responses are retried; once the
    /// budget is spent the sentinel analysis is returned.
    pub async fn analyze(&self, title: &str, content: &str) -> Retried<Analysis> {
        let request = ChatRequest {
            system: prompts::ANALYZE_ARTICLE_SYSTEM.to_string(),
            user: prompts::analyze_article(title, truncate_chars(content, MAX_CONTENT_CHARS)),
            json_output: true,
        };
        let request = &request;
        let backend = &self.backend;

        let result = retry_until(
            self.policy,
            move |attempt| async move {
                tracing::debug!(attempt, title = %title, "Requesting article analysis");
                backend.complete(request).await
            },
            |response| match response {
                Ok(text) => {
                    let parsed = parse_analysis(&text);
                    if parsed.is_none() {
                        tracing::warn!(title = %title, "Malformed analysis response");
                    }
                    parsed
                }
                Err(e) => {
                    tracing::warn!(title = %title, error = %e, "Analysis request failed");
                    None
                }
            },
            Analysis::sentinel,
        )
        .await;

        if result.exhausted {
            tracing::error!(title = %title, attempts = result.attempts, "Analysis retries exhausted");
        }

        result
    }

    /// Write the editor's overview for a set of analysed articles.
    pub async fn summarize_digest(&self, items: &[DigestItem]) -> String {
        if items.is_empty() {
            return NO_ARTICLES_INSIGHT.to_string();
        }

        let mut articles_text = String::new();
        for (i, item) in items.iter().enumerate() {
            let _ = writeln!(
                articles_text,
                "{}. Title: {}\n   Summary: {}\n",
                i + 1,
                item.title,
                item.summary
            );
        }

        let request = ChatRequest {
            system: prompts::DAILY_INSIGHT_SYSTEM.to_string(),
            user: prompts::daily_insight(truncate_chars(&articles_text, MAX_DIGEST_CHARS)),
            json_output: false,
        };

        match self.backend.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => INSIGHT_FAILED.to_string(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to generate daily overview");
                INSIGHT_FAILED.to_string()
            }
        }
    }
}

/// Accept a response only if it is a JSON object with `score` and `summary`.
pub fn parse_analysis(text: &str) -> Option<Analysis> {
    let value: Value = serde_json::from_str(strip_code_fence(text)).ok()?;
    let object = value.as_object()?;

    let score = match object.get("score")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let summary = object.get("summary")?.as_str()?.trim().to_string();
    let is_ad = match object.get("is_ad") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };

    Some(Analysis {
        score: score.round().clamp(0.0, 10.0) as u8,
        summary,
        is_ad,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(rest) => {
            // Drop the info string (e.g. "json") on the opening fence line
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            body.trim_end().trim_end_matches("```").trim()
        }
        None => text,
    }
}

/// Cut `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
