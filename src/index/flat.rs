// file: src/index/flat.rs
// description: exact cosine search over a JSON snapshot of embedded chunks
// reference: internal vector store

use super::{IndexedChunk, VectorStore};
use crate::embedding::{check_dimension, cosine_similarity};
use crate::error::{Result, WorkbenchError};
use crate::models::RetrievedChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatStore {
    dimension: usize,
    entries: Vec<IndexedChunk>,
}

impl FlatStore {
    pub fn new(dimension: usize, entries: Vec<IndexedChunk>) -> Result<Self> {
        for entry in &entries {
            check_dimension(dimension, &entry.embedding)?;
        }
        Ok(Self { dimension, entries })
    }

    /// Writes to a sibling temp file first so a failed write leaves `path` as it was.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec(self)?;
        fs::write(&tmp, json).map_err(|source| WorkbenchError::FileOperation {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| WorkbenchError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Persisted {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| {
            WorkbenchError::index_with(format!("cannot read index {}", path.display()), e)
        })?;
        let store: FlatStore = serde_json::from_slice(&raw).map_err(|e| {
            WorkbenchError::index_with(format!("corrupt index {}", path.display()), e)
        })?;
        Self::new(store.dimension, store.entries)
    }
}

#[async_trait]
impl VectorStore for FlatStore {
    fn backend(&self) -> &'static str {
        "flat"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        check_dimension(self.dimension, query)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(i, score)| {
                RetrievedChunk::from_distance(self.entries[i].chunk.clone(), 1.0 - score)
            })
            .collect())
    }
}
