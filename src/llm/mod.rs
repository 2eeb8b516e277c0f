// file: src/llm/mod.rs
// description: text generation backends and the uniform answering adapter
// reference: internal module structure

pub mod adapter;
pub mod hosted;
#[cfg(feature = "llama")]
pub mod local;
pub mod sse;

pub use adapter::{Adapter, AdapterKind};
pub use hosted::HostedChatClient;
#[cfg(feature = "llama")]
pub use local::LocalLlama;

use crate::config::{Config, ModelBackend, ModelConfig};
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::debug;

/// Incremental text pieces in generation order.
pub type TokenStream = BoxStream<'static, Result<String>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> String;

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream>;

    /// Collected output of [`TextGenerator::generate_stream`].
    async fn generate(&self, prompt: &str) -> Result<String> {
        collect_stream(self.generate_stream(prompt).await?).await
    }
}

pub async fn collect_stream(mut stream: TokenStream) -> Result<String> {
    let mut text = String::new();
    while let Some(piece) = stream.next().await {
        text.push_str(&piece?);
    }
    Ok(text)
}

/// Runs a blocking producer on the blocking pool and forwards each emitted piece.
///
/// The consumer usually prints pieces as they arrive, so `job` must release any
/// `StreamSuppressor` it takes before calling `emit`. `emit` returns false once
/// the receiving stream has been dropped.
pub fn blocking_token_stream<F>(job: F) -> TokenStream
where
    F: FnOnce(&mut dyn FnMut(String) -> bool) -> Result<usize> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded::<Result<String>>();
    tokio::task::spawn_blocking(move || {
        let mut emit = |piece: String| tx.unbounded_send(Ok(piece)).is_ok();
        match job(&mut emit) {
            Ok(count) => debug!(generated_tokens = count, "Generation complete"),
            Err(e) => {
                let _ = tx.unbounded_send(Err(e));
            }
        }
    });
    rx.boxed()
}

/// Instantiates the configured backend. Load failures surface as `ModelLoad`.
pub async fn load_generator(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    match config.model.backend {
        ModelBackend::Hosted => {
            let api_key = config.hosted_api_key()?;
            Ok(Arc::new(HostedChatClient::new(
                &config.hosted,
                api_key,
                GenerationParams::from(&config.model),
            )?))
        }
        ModelBackend::Llama => load_local(&config.model).await,
    }
}

#[cfg(feature = "llama")]
async fn load_local(model: &ModelConfig) -> Result<Arc<dyn TextGenerator>> {
    Ok(Arc::new(LocalLlama::load(model.clone()).await?))
}

#[cfg(not(feature = "llama"))]
async fn load_local(model: &ModelConfig) -> Result<Arc<dyn TextGenerator>> {
    Err(crate::error::WorkbenchError::model_load(
        &model.weights_path,
        "local inference requires building with the `llama` feature",
    ))
}
