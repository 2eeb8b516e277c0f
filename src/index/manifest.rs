// file: src/index/manifest.rs
// description: metadata describing the persisted index build
// reference: https://docs.rs/uuid

use crate::config::{ChunkingConfig, IndexBackend};
use crate::error::{Result, WorkbenchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub build_id: Uuid,
    pub backend: IndexBackend,
    /// Table (lance) or file name (flat) holding this build's rows
    pub location: String,
    pub embedder: String,
    pub dimension: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(
        backend: IndexBackend,
        base_name: &str,
        embedder: String,
        dimension: usize,
        document_count: usize,
        chunk_count: usize,
        chunking: ChunkingConfig,
    ) -> Self {
        let build_id = Uuid::new_v4();
        let location = match backend {
            IndexBackend::Lance => format!("{}_{}", base_name, build_id.simple()),
            IndexBackend::Flat => format!("{}_{}.json", base_name, build_id.simple()),
        };
        Self {
            build_id,
            backend,
            location,
            embedder,
            dimension,
            document_count,
            chunk_count,
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            created_at: Utc::now(),
        }
    }

    pub fn path(storage: &Path) -> PathBuf {
        storage.join(MANIFEST_FILE)
    }

    pub fn exists(storage: &Path) -> bool {
        Self::path(storage).is_file()
    }

    pub fn read(storage: &Path) -> Result<Self> {
        let path = Self::path(storage);
        let raw = fs::read_to_string(&path).map_err(|e| {
            WorkbenchError::index_with(format!("no index manifest at {}", path.display()), e)
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            WorkbenchError::index_with(format!("corrupt index manifest {}", path.display()), e)
        })
    }

    /// Replaces the manifest atomically: readers see the old or the new build, never a mix.
    pub fn write(&self, storage: &Path) -> Result<()> {
        let path = Self::path(storage);
        let tmp = storage.join(format!(".{}.tmp", MANIFEST_FILE));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json).map_err(|source| WorkbenchError::FileOperation {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| WorkbenchError::FileOperation { path, source })
    }

    pub fn summary(&self) -> String {
        format!(
            "build {} ({:?}) - {} chunks from {} documents, dim {}, embedder {}, chunking {}/{}, created {}",
            self.build_id,
            self.backend,
            self.chunk_count,
            self.document_count,
            self.dimension,
            self.embedder,
            self.chunk_size,
            self.chunk_overlap,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}
