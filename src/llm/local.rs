// file: src/llm/local.rs
// description: llama.cpp backed generation from local GGUF weights
// reference: https://docs.rs/llama-cpp-2

use super::{GenerationParams, TextGenerator, TokenStream, blocking_token_stream};
use crate::config::ModelConfig;
use crate::error::{Result, WorkbenchError};
use crate::utils::{StreamSuppressor, Validator, quietly};
use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

struct Loaded {
    backend: LlamaBackend,
    model: LlamaModel,
}

// SAFETY: the backend and model are only touched while holding the mutex in
// LocalLlama, one generation at a time.
unsafe impl Send for Loaded {}

/// Weights loaded once; each request gets a fresh context on a blocking thread.
pub struct LocalLlama {
    inner: Arc<Mutex<Loaded>>,
    config: ModelConfig,
    params: GenerationParams,
}

impl LocalLlama {
    pub async fn load(config: ModelConfig) -> Result<Self> {
        let weights = Validator::validate_file_path(&config.weights_path)
            .map_err(|e| WorkbenchError::model_load(&config.weights_path, e.to_string()))?;
        let verbose = config.verbose;
        let gpu_layers = config.gpu_layers;

        info!("Loading local model from {}", weights.display());
        let loaded = tokio::task::spawn_blocking(move || -> Result<Loaded> {
            let _quiet = if verbose {
                None
            } else {
                Some(StreamSuppressor::new()?)
            };
            let mut backend = LlamaBackend::init()
                .map_err(|e| WorkbenchError::model_load(&weights, format!("backend init: {}", e)))?;
            if !verbose {
                backend.void_logs();
            }
            let model_params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers);
            let model = LlamaModel::load_from_file(&backend, &weights, &model_params)
                .map_err(|e| WorkbenchError::model_load(&weights, e.to_string()))?;
            Ok(Loaded { backend, model })
        })
        .await
        .map_err(|e| WorkbenchError::model_load(&config.weights_path, format!("loader task failed: {}", e)))??;

        let params = GenerationParams::from(&config);
        Ok(Self {
            inner: Arc::new(Mutex::new(loaded)),
            config,
            params,
        })
    }
}

fn run_generation(
    loaded: &Loaded,
    config: &ModelConfig,
    params: GenerationParams,
    prompt: &str,
    emit: &mut dyn FnMut(String) -> bool,
) -> Result<usize> {
    let n_ctx = NonZeroU32::new(config.context_size)
        .ok_or_else(|| WorkbenchError::Configuration("model.context_size must be > 0".to_string()))?;
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(Some(n_ctx))
        .with_n_batch(config.batch_size);
    // native setup chatter is silenced; tokens are emitted with the streams restored
    let mut ctx = quietly(config.verbose, || {
        loaded.model.new_context(&loaded.backend, ctx_params)
    })?
    .map_err(|e| WorkbenchError::generation_with("failed to create context", e))?;

    let tokens = loaded
        .model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| WorkbenchError::generation_with("tokenization failed", e))?;
    let batch_size = config.batch_size as usize;
    if tokens.len() > batch_size || tokens.len() >= config.context_size as usize {
        return Err(WorkbenchError::generation(format!(
            "prompt has {} tokens, limits are batch {} and context {}",
            tokens.len(),
            batch_size,
            config.context_size
        )));
    }

    let mut batch = LlamaBatch::new(batch_size, 1);
    let last = tokens.len().saturating_sub(1);
    for (i, &token) in tokens.iter().enumerate() {
        batch
            .add(token, i as i32, &[0], i == last)
            .map_err(|e| WorkbenchError::generation_with("failed to add token to batch", e))?;
    }
    quietly(config.verbose, || ctx.decode(&mut batch))?
        .map_err(|e| WorkbenchError::generation_with("prompt decode failed", e))?;

    let mut sampler = if params.temperature > 0.0 {
        LlamaSampler::chain_simple([
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(config.seed),
        ])
    } else {
        LlamaSampler::greedy()
    };

    let mut position = tokens.len() as i32;
    let mut pending_bytes: Vec<u8> = Vec::new();
    let mut generated = 0;

    while generated < params.max_tokens && (position as u32) < config.context_size {
        let token = sampler.sample(&ctx, batch.n_tokens() - 1);
        if loaded.model.is_eog_token(token) {
            debug!("End of generation token reached");
            break;
        }
        generated += 1;

        let bytes = loaded
            .model
            .token_to_bytes(token, Special::Tokenize)
            .map_err(|e| WorkbenchError::generation_with("token decoding failed", e))?;
        pending_bytes.extend_from_slice(&bytes);
        // a token may end inside a multi-byte character; hold the tail back
        let valid = match std::str::from_utf8(&pending_bytes) {
            Ok(s) => s.len(),
            Err(e) => e.valid_up_to(),
        };
        if valid > 0 {
            let piece = String::from_utf8_lossy(&pending_bytes[..valid]).into_owned();
            pending_bytes.drain(..valid);
            if !emit(piece) {
                break;
            }
        }

        batch.clear();
        batch
            .add(token, position, &[0], true)
            .map_err(|e| WorkbenchError::generation_with("failed to add token", e))?;
        ctx.decode(&mut batch)
            .map_err(|e| WorkbenchError::generation_with("decode failed", e))?;
        position += 1;
    }

    if !pending_bytes.is_empty() {
        emit(String::from_utf8_lossy(&pending_bytes).into_owned());
    }
    Ok(generated)
}

#[async_trait]
impl TextGenerator for LocalLlama {
    fn name(&self) -> String {
        format!("llama:{}", self.config.weights_path.display())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        let inner = Arc::clone(&self.inner);
        let config = self.config.clone();
        let params = self.params;
        let prompt = prompt.to_string();

        Ok(blocking_token_stream(move |emit| {
            let loaded = inner.lock().unwrap_or_else(|e| e.into_inner());
            run_generation(&loaded, &config, params, &prompt, emit)
        }))
    }
}
