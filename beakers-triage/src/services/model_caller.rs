//! Cached, time-bounded inference calls
//!
//! Shared by the scoring committee and the evidence upgrader. A completed
//! exchange is cached even when the text later turns out to be unparsable;
//! failed calls have no content and are never cached.

use crate::config::InferenceConfig;
use crate::models::Role;
use crate::services::inference::{GenerationRequest, InferenceEndpoint, InferenceError};
use crate::services::response_cache::{CacheKey, ResponseCache};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a call may be answered from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    UseCache,
    /// Always call the endpoint, then overwrite the cached entry
    Refresh,
}

/// Outcome of one call
#[derive(Debug, Clone)]
pub struct CallAttempt {
    pub prompt_hash: String,
    pub cache_hit: bool,
    pub response: Result<String, InferenceError>,
}

/// Endpoint plus cache plus generation settings
#[derive(Clone)]
pub struct ModelCaller {
    endpoint: Arc<dyn InferenceEndpoint>,
    cache: ResponseCache,
    config: InferenceConfig,
}

impl ModelCaller {
    pub fn new(
        endpoint: Arc<dyn InferenceEndpoint>,
        cache: ResponseCache,
        config: InferenceConfig,
    ) -> Self {
        Self {
            endpoint,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Call `model` with `prompt` under `role`
    pub async fn call(
        &self,
        model: &str,
        role: Role,
        prompt: &str,
        policy: CachePolicy,
    ) -> CallAttempt {
        self.call_with_context(model, role, prompt, self.config.context_tokens, policy)
            .await
    }

    /// Same as [`call`](Self::call) with an explicit context window
    pub async fn call_with_context(
        &self,
        model: &str,
        role: Role,
        prompt: &str,
        context_tokens: u32,
        policy: CachePolicy,
    ) -> CallAttempt {
        let key = CacheKey::new(model, role, prompt);

        if policy == CachePolicy::UseCache {
            if let Some(entry) = self.cache.get(&key).await {
                return CallAttempt {
                    prompt_hash: key.prompt_hash,
                    cache_hit: true,
                    response: Ok(entry.raw_text),
                };
            }
        }

        let request = GenerationRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            context_tokens,
        };

        debug!(
            endpoint = self.endpoint.name(),
            model,
            role = %role,
            hash = %key.prompt_hash,
            "Calling inference endpoint"
        );

        let response = match tokio::time::timeout(self.config.timeout, self.endpoint.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.config.timeout.as_millis() as u64)),
        };

        if let Ok(text) = &response {
            if let Err(e) = self.cache.put(&key, text).await {
                warn!(model, role = %role, error = %e, "Failed to write response cache entry");
            }
        }

        CallAttempt {
            prompt_hash: key.prompt_hash,
            cache_hit: false,
            response,
        }
    }
}
