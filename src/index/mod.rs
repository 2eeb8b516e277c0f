// file: src/index/mod.rs
// description: vector index persistence and retrieval
// reference: internal module structure

pub mod flat;
pub mod lance;
pub mod manifest;

pub use flat::FlatStore;
pub use lance::LanceStore;
pub use manifest::IndexManifest;

use crate::config::{IndexBackend, IndexConfig};
use crate::error::{Result, WorkbenchError};
use crate::models::{Chunk, Embedding, RetrievedChunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// Read-only nearest-neighbour lookup over a built index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> &'static str;

    fn dimension(&self) -> usize;

    async fn count(&self) -> Result<usize>;

    /// Up to `limit` chunks, closest first.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Writes a complete build under `config.storage_path` and switches the
/// manifest to it. The previous build stays readable until the manifest is
/// replaced and is removed afterwards.
pub async fn persist(
    config: &IndexConfig,
    manifest: &IndexManifest,
    entries: Vec<IndexedChunk>,
) -> Result<Arc<dyn VectorStore>> {
    let storage = config.storage_path.as_path();
    fs::create_dir_all(storage).map_err(|source| WorkbenchError::FileOperation {
        path: storage.to_path_buf(),
        source,
    })?;

    let store: Arc<dyn VectorStore> = match manifest.backend {
        IndexBackend::Lance => Arc::new(
            LanceStore::create(storage, &manifest.location, manifest.dimension, &entries).await?,
        ),
        IndexBackend::Flat => {
            let store = FlatStore::new(manifest.dimension, entries)?;
            store.persist(&storage.join(&manifest.location))?;
            Arc::new(store)
        }
    };

    manifest.write(storage)?;
    info!("Persisted index {}", manifest.summary());

    if let Err(e) = remove_stale(config, manifest).await {
        warn!("Failed to remove previous index builds: {}", e);
    }

    Ok(store)
}

/// Opens the build named by the manifest in `config.storage_path`.
pub async fn open(config: &IndexConfig) -> Result<(Arc<dyn VectorStore>, IndexManifest)> {
    let storage = config.storage_path.as_path();
    let manifest = IndexManifest::read(storage)?;

    if manifest.backend != config.backend {
        warn!(
            "Index at {} was built with the {:?} backend, configuration asks for {:?}; using the persisted backend",
            storage.display(),
            manifest.backend,
            config.backend
        );
    }

    let store: Arc<dyn VectorStore> = match manifest.backend {
        IndexBackend::Lance => {
            Arc::new(LanceStore::open(storage, &manifest.location, manifest.dimension).await?)
        }
        IndexBackend::Flat => Arc::new(FlatStore::open(&storage.join(&manifest.location))?),
    };

    let rows = store.count().await?;
    if rows != manifest.chunk_count {
        return Err(WorkbenchError::index(format!(
            "corrupt index at {}: manifest lists {} chunks, store holds {}",
            storage.display(),
            manifest.chunk_count,
            rows
        )));
    }

    info!("Loaded index {}", manifest.summary());
    Ok((store, manifest))
}

async fn remove_stale(config: &IndexConfig, manifest: &IndexManifest) -> Result<()> {
    let storage = config.storage_path.as_path();
    let prefix = format!("{}_", config.table_name);

    if manifest.backend == IndexBackend::Lance {
        LanceStore::drop_stale(storage, &config.table_name, &manifest.location).await?;
    }

    for entry in fs::read_dir(storage)? {
        let path = entry?.path();
        if is_stale_snapshot(&path, &prefix, &manifest.location) {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn is_stale_snapshot(path: &Path, prefix: &str, keep: &str) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(prefix) && n.ends_with(".json") && n != keep)
            .unwrap_or(false)
}
