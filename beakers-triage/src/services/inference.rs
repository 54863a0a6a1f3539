//! Inference endpoint seam
//!
//! The committee and the evidence upgrader only see this trait. The default
//! implementation talks to an Ollama server; tests substitute scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inference call errors
///
/// All variants are treated as transient call failures by callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Inference call timed out after {0} ms")]
    Timeout(u64),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Endpoint returned an empty response")]
    EmptyResponse,
}

/// One generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_tokens: u32,
}

/// Synchronous text generation
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    /// Human-readable endpoint identity for logs
    fn name(&self) -> &str;

    /// Generate free text for one prompt
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InferenceError>;
}
