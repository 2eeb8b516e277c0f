// file: src/rag/mod.rs
// description: retrieval-augmented generation module exports
// reference: internal module structure

pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod retriever;

pub use orchestrator::{OrchestratorState, QuestionOutcome, RagOrchestrator};
pub use progress::{BuildStats, EmbeddingProgress};
pub use prompt::{DEFAULT_TEMPLATE, PromptTemplate};
pub use retriever::Retriever;
