//! OpenAI-compatible chat completions, shared by the generated reports and
//! the vocabulary word generator.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiConfig;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error("chat request failed with status {0}")]
    HttpStatus(StatusCode),
    #[error("chat returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    /// The endpoint asked us to slow down.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ChatError::HttpStatus(StatusCode::TOO_MANY_REQUESTS))
    }
}

/// One prompt in, one completion out.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// # Errors
    ///
    /// Returns `ChatError` when the request fails or yields no text.
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: AiConfig,
}

impl ChatClient {
    #[must_use]
    pub fn new(client: Client, config: AiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            log::warn!("chat request failed with status {status}");
            return Err(ChatError::HttpStatus(status));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ChatError::EmptyResponse)
    }
}

/// Strips code fences and any prose around the outermost JSON object.
pub(crate) fn clean_json_response(response: &str) -> String {
    let mut cleaned = response.trim().to_string();

    if cleaned.starts_with("```") {
        let lines: Vec<&str> = cleaned.lines().collect();
        if lines.len() > 2 {
            cleaned = lines[1..lines.len() - 1].join("\n");
        }
    }

    if let Some(start) = cleaned.find('{')
        && let Some(end) = cleaned.rfind('}')
        && start < end
    {
        cleaned = cleaned[start..=end].to_string();
    }

    cleaned.trim().to_string()
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
