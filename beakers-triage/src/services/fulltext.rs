//! Full-text access for the evidence upgrade
//!
//! Acquisition happens elsewhere; this module only reads what it stored.

use crate::error::Result;
use crate::models::TriageResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Largest full text handed to section extraction
pub const MAX_FULLTEXT_BYTES: usize = 4 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF";
const BINARY_SNIFF_BYTES: usize = 8192;

/// PDFs and other binary files stored where extracted text was expected
fn looks_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    let head = head.strip_prefix(b"\xef\xbb\xbf".as_slice()).unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    head[start..].starts_with(PDF_MAGIC) || head.contains(&0)
}

/// Source of an article's full text
#[async_trait]
pub trait FullTextSource: Send + Sync {
    /// Full text for `result`, or `None` when unavailable
    async fn load(&self, result: &TriageResult) -> Result<Option<String>>;
}

/// Reads the plain-text file recorded in `fulltext_path`
///
/// Relative paths are resolved against `base_dir`. Binary files, PDFs
/// included, count as unavailable text.
#[derive(Debug, Clone)]
pub struct FileFullTextSource {
    base_dir: PathBuf,
}

impl FileFullTextSource {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[async_trait]
impl FullTextSource for FileFullTextSource {
    async fn load(&self, result: &TriageResult) -> Result<Option<String>> {
        let Some(path) = result.fulltext.path.as_deref().filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };

        let path = self.resolve(path);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Full text file not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if looks_binary(&bytes) {
            warn!(path = %path.display(), "Full text file is binary, not extracted text");
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&bytes);
        let text = crate::utils::truncate_to_char_boundary(&text, MAX_FULLTEXT_BYTES);
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }
}
