// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod hardware;
pub mod imaging;
pub mod index;
pub mod llm;
pub mod models;
pub mod rag;
pub mod segmentation;
pub mod utils;

pub use config::{
    ChunkingConfig, Config, CorpusConfig, EmbeddingConfig, HostedConfig, IndexConfig, ModelConfig,
    PromptConfig, SegmentationConfig,
};
pub use corpus::{CorpusLoader, TextChunker};
pub use embedding::{Embedder, HashingEmbedder, HttpEmbeddingClient};
pub use error::{Result, WorkbenchError};
pub use hardware::{HardwareReport, collect_report, format_bytes};
pub use imaging::{ImagePipeline, SequenceReport, Transform};
pub use index::{IndexManifest, IndexedChunk, VectorStore};
pub use llm::{Adapter, AdapterKind, TextGenerator, TokenStream};
pub use models::{Chunk, Document, Embedding, RetrievedChunk};
pub use rag::{BuildStats, PromptTemplate, RagOrchestrator, Retriever};
pub use segmentation::{Mask, MaskGenerator, Segmenter};
pub use utils::{OperationTimer, StreamSuppressor, Validator};
