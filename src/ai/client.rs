use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// One system + user exchange with a chat model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    /// Ask the model to answer with a single JSON object.
    pub json_output: bool,
}

/// A chat completion service. Returns the raw text of the first choice.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: String, base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::AiApi(format!("HTTP {status}: {error_text}")));
        }

        let completion: CompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::AiApi("No content in response".to_string()))
    }
}
