// file: src/rag/retriever.rs
// description: embeds a question and fetches its nearest chunks
// reference: internal retrieval

use crate::embedding::Embedder;
use crate::error::{Result, WorkbenchError};
use crate::index::VectorStore;
use crate::models::RetrievedChunk;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, top_k: usize) -> Result<Self> {
        if store.dimension() != embedder.dimension() {
            return Err(WorkbenchError::index(format!(
                "index dimension {} does not match embedder {} ({})",
                store.dimension(),
                embedder.name(),
                embedder.dimension()
            )));
        }
        Ok(Self {
            store,
            embedder,
            top_k,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve_k(question, self.top_k).await
    }

    pub async fn retrieve_k(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query = self.embedder.embed(question).await?;
        let hits = self.store.search(&query, k).await?;
        debug!(
            "Retrieved {} chunks (best score {:.4})",
            hits.len(),
            hits.first().map(|h| h.score).unwrap_or(0.0)
        );
        Ok(hits)
    }
}
