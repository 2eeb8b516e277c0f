// file: src/embedding/http.rs
// description: OpenAI-compatible embeddings endpoint client
// reference: https://platform.openai.com/docs/api-reference/embeddings

use super::{Embedder, check_dimension};
use crate::config::EmbeddingConfig;
use crate::error::{Result, WorkbenchError};
use crate::models::Embedding;
use crate::utils::Validator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const MAX_INPUTS_PER_REQUEST: usize = 64;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        Validator::validate_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WorkbenchError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Embedding>> {
        debug!(
            "Requesting {} embeddings from {}",
            inputs.len(),
            self.endpoint
        );

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            input: inputs,
            model: &self.model,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkbenchError::index_with("embedding request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(WorkbenchError::index(format!(
                "embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| WorkbenchError::index_with("failed to parse embedding response", e))?;

        if body.data.len() != inputs.len() {
            return Err(WorkbenchError::index(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                body.data.len(),
                inputs.len()
            )));
        }

        body.data.sort_by_key(|d| d.index);
        body.data
            .into_iter()
            .map(|d| {
                check_dimension(self.dimension, &d.embedding)?;
                Ok(d.embedding)
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbeddingClient {
    fn name(&self) -> String {
        format!("http:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }
}
