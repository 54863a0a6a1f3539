//! Content-addressed inference response cache
//!
//! Entries are keyed by (model, role, SHA-256 of the exact prompt text) and
//! stored one JSON file per key under the cache directory. Writes go through
//! a uniquely named temp file and a rename, so concurrent writers of the same
//! key converge on one complete entry (last write wins).

use crate::error::Result;
use crate::models::{now_timestamp, Role};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// SHA-256 of the prompt text, lowercase hex
pub fn prompt_hash(prompt: &str) -> String {
    format!("{:x}", Sha256::digest(prompt.as_bytes()))
}

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model: String,
    pub role: Role,
    pub prompt_hash: String,
}

impl CacheKey {
    pub fn new(model: &str, role: Role, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            role,
            prompt_hash: prompt_hash(prompt),
        }
    }

    fn file_name(&self) -> String {
        let model: String = self
            .model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        format!("{}_{}_{}.json", model, self.role.as_str(), self.prompt_hash)
    }
}

/// Stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub model: String,
    pub role: Role,
    pub prompt_hash: String,
    pub raw_text: String,
    pub created_at: String,
}

/// File-backed response cache
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open (creating if needed) a cache rooted at `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Look up a response. Unreadable or mismatched entries are misses.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };

        match serde_json::from_slice::<CachedResponse>(&bytes) {
            Ok(entry) if entry.prompt_hash == key.prompt_hash && entry.model == key.model => {
                debug!(model = %key.model, role = %key.role, hash = %key.prompt_hash, "Cache hit");
                Some(entry)
            }
            Ok(_) => {
                warn!(path = %path.display(), "Cache entry does not match its key; ignoring");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache entry; ignoring");
                None
            }
        }
    }

    /// Store a response, replacing any previous entry for the key
    pub async fn put(&self, key: &CacheKey, raw_text: &str) -> Result<CachedResponse> {
        let entry = CachedResponse {
            model: key.model.clone(),
            role: key.role,
            prompt_hash: key.prompt_hash.clone(),
            raw_text: raw_text.to_string(),
            created_at: now_timestamp(),
        };

        let path = self.entry_path(key);
        let tmp_path = self.dir.join(format!(
            ".{}.{}.tmp",
            key.file_name(),
            uuid::Uuid::new_v4().simple()
        ));

        let bytes = serde_json::to_vec_pretty(&entry)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(entry)
    }
}
