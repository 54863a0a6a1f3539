//! Ollama chat client
//!
//! Sends one user message to `/api/chat` with streaming disabled and returns
//! the assistant message content.

use crate::config::InferenceConfig;
use crate::services::inference::{GenerationRequest, InferenceEndpoint, InferenceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("beakers-triage/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama HTTP client
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        Self::new(&config.base_url, config.timeout)
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl InferenceEndpoint for OllamaClient {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, InferenceError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                num_ctx: request.context_tokens,
            },
        };

        tracing::debug!(
            model = %request.model,
            prompt_chars = request.prompt.len(),
            "Ollama chat request"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    InferenceError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api(status.as_u16(), error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Network(format!("invalid response body: {}", e)))?;

        let content = chat.message.map(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        Ok(content)
    }
}
