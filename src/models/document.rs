// file: src/models/document.rs
// description: loaded corpus document with content hash
// reference: internal data structures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source: PathBuf,
    pub content: String,
    pub content_hash: String,
    pub byte_len: u64,
}

impl Document {
    pub fn new(source: impl Into<PathBuf>, content: String) -> Self {
        let content_hash = compute_hash(content.as_bytes());
        let byte_len = content.len() as u64;
        Self {
            source: source.into(),
            content,
            content_hash,
            byte_len,
        }
    }

    /// Display name used in chunk metadata and log lines.
    pub fn source_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

pub(crate) fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
