use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AnalysisConfig;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request rejected with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("no analysis result received")]
    NoChoices,
}

/// Turns a prompt into a completion. The only way the rest of the crate talks to a language
/// model.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for OpenAI style `chat/completions` endpoints.
pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: AnalysisConfig,
}

impl ChatCompletionClient {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Received completion response");
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::NoChoices)
    }
}
