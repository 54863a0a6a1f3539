//! Runtime configuration for beakers-triage
//!
//! Resolved once at startup and passed explicitly to every component.
//!
//! **Priority:** ENV → TOML → built-in default, for the endpoint URL and
//! model names. All other values come from TOML or defaults.

use beakers_common::config::{self as common_config, TomlConfig};
use beakers_common::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const OLLAMA_URL_ENV_VAR: &str = "BEAKERS_OLLAMA_URL";
pub const BUILDER_MODEL_ENV_VAR: &str = "BEAKERS_BUILDER_MODEL";
pub const SKEPTIC_MODEL_ENV_VAR: &str = "BEAKERS_SKEPTIC_MODEL";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_BUILDER_MODEL: &str = "qwen3:latest";
const DEFAULT_SKEPTIC_MODEL: &str = "gemma2:9b";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_CONTEXT_TOKENS: u32 = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONCURRENCY: usize = 4;

/// Inference endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub builder_model: String,
    pub skeptic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_tokens: u32,
    /// Per-call bound; expiry counts as a call failure
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            builder_model: DEFAULT_BUILDER_MODEL.to_string(),
            skeptic_model: DEFAULT_SKEPTIC_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            context_tokens: DEFAULT_CONTEXT_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Per (period, discipline) slot quotas
///
/// Indepth is fixed at one slot. Minimums are targets: falling short is
/// reported, never padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionQuotas {
    pub digest_min: usize,
    pub digest_max: usize,
    pub blurb_min: usize,
    pub blurb_max: usize,
}

impl SelectionQuotas {
    pub const INDEPTH_MAX: usize = 1;
}

impl Default for SelectionQuotas {
    fn default() -> Self {
        Self {
            digest_min: 3,
            digest_max: 7,
            blurb_min: 10,
            blurb_max: 30,
        }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageConfig {
    pub database_path: PathBuf,
    pub cache_dir: PathBuf,
    pub inference: InferenceConfig,
    pub quotas: SelectionQuotas,
    /// Articles scored concurrently
    pub concurrency: usize,
}

impl TriageConfig {
    /// Defaults rooted at `root_folder`
    pub fn with_root(root_folder: &Path) -> Self {
        Self {
            database_path: root_folder.join("data").join("articles.db"),
            cache_dir: root_folder.join("cache").join("llm"),
            inference: InferenceConfig::default(),
            quotas: SelectionQuotas::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Resolve from bootstrap TOML plus environment overrides
    pub fn from_toml(root_folder: &Path, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = Self::with_root(root_folder);
        let section = &toml_config.inference;

        let inference = InferenceConfig {
            base_url: resolve_string(
                OLLAMA_URL_ENV_VAR,
                section.base_url.as_ref(),
                &defaults.inference.base_url,
            ),
            builder_model: resolve_string(
                BUILDER_MODEL_ENV_VAR,
                section.builder_model.as_ref(),
                &defaults.inference.builder_model,
            ),
            skeptic_model: resolve_string(
                SKEPTIC_MODEL_ENV_VAR,
                section.skeptic_model.as_ref(),
                &defaults.inference.skeptic_model,
            ),
            temperature: section.temperature.unwrap_or(defaults.inference.temperature),
            max_tokens: section.max_tokens.unwrap_or(defaults.inference.max_tokens),
            context_tokens: section.context_tokens.unwrap_or(defaults.inference.context_tokens),
            timeout: section
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.inference.timeout),
        };

        let selection = &toml_config.selection;
        let quotas = SelectionQuotas {
            digest_min: selection.digest_min.unwrap_or(defaults.quotas.digest_min),
            digest_max: selection.digest_max.unwrap_or(defaults.quotas.digest_max),
            blurb_min: selection.blurb_min.unwrap_or(defaults.quotas.blurb_min),
            blurb_max: selection.blurb_max.unwrap_or(defaults.quotas.blurb_max),
        };

        let config = Self {
            database_path: common_config::database_path(root_folder, toml_config),
            cache_dir: common_config::cache_dir(root_folder, toml_config),
            inference,
            quotas,
            concurrency: toml_config.batch.concurrency.unwrap_or(defaults.concurrency),
        };

        config.validate()?;
        info!(
            builder = %config.inference.builder_model,
            skeptic = %config.inference.skeptic_model,
            endpoint = %config.inference.base_url,
            "Triage configuration resolved"
        );
        Ok(config)
    }

    /// Reject unusable values; warn on questionable ones
    pub fn validate(&self) -> Result<()> {
        if self.quotas.digest_min > self.quotas.digest_max {
            return Err(Error::Config(format!(
                "digest_min ({}) exceeds digest_max ({})",
                self.quotas.digest_min, self.quotas.digest_max
            )));
        }
        if self.quotas.blurb_min > self.quotas.blurb_max {
            return Err(Error::Config(format!(
                "blurb_min ({}) exceeds blurb_max ({})",
                self.quotas.blurb_min, self.quotas.blurb_max
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("batch concurrency must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            return Err(Error::Config(format!(
                "temperature {} is outside 0.0-2.0",
                self.inference.temperature
            )));
        }

        let timeout_secs = self.inference.timeout.as_secs();
        if !(60..=300).contains(&timeout_secs) {
            warn!(
                timeout_secs,
                "Inference timeout outside the usual 60-300 s range"
            );
        }

        Ok(())
    }
}

fn resolve_string(env_var: &str, toml_value: Option<&String>, default: &str) -> String {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    toml_value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
