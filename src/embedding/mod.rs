// file: src/embedding/mod.rs
// description: text embedding backends behind a common trait
// reference: internal module structure

pub mod hashing;
pub mod http;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use crate::error::{Result, WorkbenchError};
use crate::models::Embedding;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the index manifest.
    fn name(&self) -> String;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WorkbenchError::index("embedder returned no vector"))
    }
}

pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedding.provider {
        EmbeddingProvider::Http => Arc::new(HttpEmbeddingClient::new(
            &config.embedding,
            config.embedding_api_key()?,
        )?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.embedding.dimension)),
    };
    Ok(embedder)
}

/// Rejects vectors whose length differs from `expected`.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(WorkbenchError::index(format!(
            "embedding dimension mismatch: expected {}, got {}",
            expected,
            vector.len()
        )));
    }
    Ok(())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
