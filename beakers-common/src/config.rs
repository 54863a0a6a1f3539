//! Bootstrap configuration loading and root folder resolution
//!
//! The TOML file only carries bootstrap concerns: where the database and
//! response cache live, how to reach the inference endpoint, logging level,
//! selection quotas and batch concurrency. Everything is optional; missing
//! values fall back to built-in defaults.
//!
//! # Config file resolution priority
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`BEAKERS_CONFIG`)
//! 3. `~/.config/beakers/config.toml` (or `/etc/beakers/config.toml` on Linux)
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BEAKERS_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "BEAKERS_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding `articles.db` and `cache/llm` unless overridden
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path (overrides `<root>/data/articles.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Explicit response cache directory (overrides `<root>/cache/llm`)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub inference: InferenceSection,

    #[serde(default)]
    pub selection: SelectionSection,

    #[serde(default)]
    pub batch: BatchSection,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `[inference]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceSection {
    pub base_url: Option<String>,
    pub builder_model: Option<String>,
    pub skeptic_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub context_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// `[selection]` section (weekly quotas per period and discipline)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSection {
    pub digest_min: Option<usize>,
    pub digest_max: Option<usize>,
    pub blurb_min: Option<usize>,
    pub blurb_max: Option<usize>,
}

/// `[batch]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSection {
    /// Number of articles scored concurrently
    pub concurrency: Option<usize>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the config file following the documented priority order.
///
/// Returns `None` when no file is found; callers then use defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config locations
    let user_config = dirs::config_dir().map(|d| d.join("beakers").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/beakers/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load bootstrap configuration.
///
/// An explicitly named file that does not exist is an error; an absent
/// default location just yields `TomlConfig::default()`.
pub fn load_toml_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let explicit = cli_arg.is_some() || std::env::var(CONFIG_ENV_VAR).is_ok();

    let Some(path) = resolve_config_path(cli_arg) else {
        debug!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/beakers
        dirs::data_local_dir()
            .map(|d| d.join("beakers"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/beakers"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("beakers"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/beakers"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("beakers"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\beakers"))
    } else {
        PathBuf::from("./beakers_data")
    }
}

/// Database path: TOML override, else `<root>/data/articles.db`
pub fn database_path(root_folder: &Path, toml_config: &TomlConfig) -> PathBuf {
    toml_config
        .database_path
        .clone()
        .unwrap_or_else(|| root_folder.join("data").join("articles.db"))
}

/// Response cache directory: TOML override, else `<root>/cache/llm`
pub fn cache_dir(root_folder: &Path, toml_config: &TomlConfig) -> PathBuf {
    toml_config
        .cache_dir
        .clone()
        .unwrap_or_else(|| root_folder.join("cache").join("llm"))
}
