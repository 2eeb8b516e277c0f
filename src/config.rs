// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{Result, WorkbenchError};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub model: ModelConfig,
    pub hosted: HostedConfig,
    pub prompt: PromptConfig,
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorpusConfig {
    pub directory: PathBuf,
    pub extensions: Vec<String>,
    pub max_file_size_mb: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Lance,
    Flat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub storage_path: PathBuf,
    pub table_name: String,
    pub top_k: usize,
    /// Rebuild from the corpus on start instead of loading the persisted index.
    pub rebuild: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Http,
    Hashing,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key, if the endpoint needs one.
    pub api_key_env: Option<String>,
    pub dimension: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    Hosted,
    Llama,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub backend: ModelBackend,
    pub weights_path: PathBuf,
    pub context_size: u32,
    pub batch_size: u32,
    pub gpu_layers: u32,
    pub max_tokens: usize,
    pub temperature: f32,
    pub seed: u32,
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostedConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    pub language: String,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentationConfig {
    pub checkpoint: PathBuf,
    pub variant: String,
    pub use_gpu: bool,
    pub points_per_side: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HardwareConfig {
    /// Log the hardware report when the orchestrator starts.
    pub log_on_start: bool,
    pub include_gpu: bool,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LLM_WORKBENCH")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| WorkbenchError::Configuration(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| WorkbenchError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            corpus: CorpusConfig {
                directory: PathBuf::from("data/corpus"),
                extensions: vec!["txt".to_string()],
                max_file_size_mb: 10,
            },
            chunking: ChunkingConfig {
                chunk_size: 120,
                chunk_overlap: 0,
            },
            index: IndexConfig {
                backend: IndexBackend::Lance,
                storage_path: PathBuf::from("data/index"),
                table_name: "chunks".to_string(),
                top_k: 4,
                rebuild: false,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Http,
                base_url: "http://localhost:11434".to_string(),
                model: "nomic-embed-text".to_string(),
                api_key_env: None,
                dimension: 768,
                timeout_secs: 60,
            },
            model: ModelConfig {
                backend: ModelBackend::Llama,
                weights_path: PathBuf::from("models/llama-2-7b-chat.Q5_K_M.gguf"),
                context_size: 2048,
                batch_size: 2048,
                gpu_layers: 1,
                max_tokens: 1000,
                temperature: 0.8,
                seed: 1234,
                verbose: false,
            },
            hosted: HostedConfig {
                base_url: "https://api.openai.com".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_secs: 120,
            },
            prompt: PromptConfig {
                language: "Portuguese".to_string(),
                template: None,
            },
            segmentation: SegmentationConfig {
                checkpoint: PathBuf::from("models/sam_vit_b_01ec64.safetensors"),
                variant: "vit_b".to_string(),
                use_gpu: false,
                points_per_side: 32,
                seed: None,
            },
            hardware: HardwareConfig::default(),
        }
    }

    /// Reads the API key for the hosted backend from the configured variable.
    pub fn hosted_api_key(&self) -> Result<String> {
        std::env::var(&self.hosted.api_key_env).map_err(|_| {
            WorkbenchError::Configuration(format!(
                "environment variable {} is not set",
                self.hosted.api_key_env
            ))
        })
    }

    pub fn embedding_api_key(&self) -> Result<Option<String>> {
        match &self.embedding.api_key_env {
            None => Ok(None),
            Some(name) => std::env::var(name).map(Some).map_err(|_| {
                WorkbenchError::Configuration(format!("environment variable {} is not set", name))
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(WorkbenchError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(WorkbenchError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.index.top_k == 0 {
            return Err(WorkbenchError::Configuration(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(WorkbenchError::Configuration(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        if self.corpus.extensions.is_empty() {
            return Err(WorkbenchError::Configuration(
                "corpus.extensions must list at least one extension".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 120);
        assert_eq!(config.chunking.chunk_overlap, 0);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default_config();
        config.chunking.chunk_overlap = 120;
        assert!(matches!(
            config.validate(),
            Err(WorkbenchError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = Config::default_config();
        config.index.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let defaults = Config::default_config();
        let mut toml = String::new();
        toml.push_str("[corpus]\ndirectory = \"docs\"\nextensions = [\"txt\", \"md\"]\nmax_file_size_mb = 5\n");
        toml.push_str("[chunking]\nchunk_size = 200\nchunk_overlap = 20\n");
        toml.push_str("[index]\nbackend = \"flat\"\nstorage_path = \"idx\"\ntable_name = \"t\"\ntop_k = 3\nrebuild = true\n");
        toml.push_str(&format!(
            "[embedding]\nprovider = \"hashing\"\nbase_url = \"{}\"\nmodel = \"m\"\ndimension = 64\ntimeout_secs = 5\n",
            defaults.embedding.base_url
        ));
        toml.push_str("[model]\nbackend = \"hosted\"\nweights_path = \"w.gguf\"\ncontext_size = 512\nbatch_size = 64\ngpu_layers = 0\nmax_tokens = 50\ntemperature = 0.1\nseed = 7\nverbose = true\n");
        toml.push_str("[hosted]\nbase_url = \"http://localhost\"\nmodel = \"m\"\napi_key_env = \"KEY\"\ntimeout_secs = 1\n");
        toml.push_str("[prompt]\nlanguage = \"English\"\n");
        toml.push_str("[segmentation]\ncheckpoint = \"sam.safetensors\"\nvariant = \"vit_b\"\nuse_gpu = false\npoints_per_side = 16\n");

        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.index.backend, IndexBackend::Flat);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.model.backend, ModelBackend::Hosted);
        assert_eq!(config.corpus.extensions, vec!["txt", "md"]);
        assert_eq!(config.chunking.chunk_overlap, 20);
        assert!(config.prompt.template.is_none());
        assert!(config.segmentation.seed.is_none());
        assert!(!config.hardware.log_on_start);
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let loaded = Config::load(Some(&path)).unwrap();
        let defaults = Config::default_config();
        assert_eq!(loaded.chunking.chunk_size, defaults.chunking.chunk_size);
        assert_eq!(loaded.index.top_k, defaults.index.top_k);
        assert_eq!(loaded.index.backend, defaults.index.backend);
        assert_eq!(loaded.model.max_tokens, defaults.model.max_tokens);
        assert_eq!(loaded.embedding.dimension, defaults.embedding.dimension);
        assert_eq!(loaded.prompt.language, defaults.prompt.language);
        assert_eq!(loaded.hosted.api_key_env, "OPENAI_API_KEY");
    }
}
