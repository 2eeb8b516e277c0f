// file: src/rag/orchestrator.rs
// description: index build/load, model load and question answering lifecycle
// reference: internal orchestration layer

use super::progress::{BuildStats, EmbeddingProgress};
use super::{PromptTemplate, Retriever};
use crate::config::{Config, IndexConfig, ModelBackend};
use crate::corpus::{CorpusLoader, TextChunker};
use crate::embedding::{Embedder, check_dimension};
use crate::error::{Result, WorkbenchError};
use crate::hardware;
use crate::index::{self, IndexManifest, IndexedChunk, VectorStore};
use crate::llm::{self, Adapter, TextGenerator, TokenStream};
use crate::models::RetrievedChunk;
use crate::utils::OperationTimer;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    IndexReady,
    ModelReady,
    Answering,
}

#[derive(Debug)]
pub struct QuestionOutcome {
    pub question: String,
    pub result: Result<String>,
}

pub struct RagOrchestrator {
    config: Config,
    embedder: Arc<dyn Embedder>,
    template: PromptTemplate,
    store: Option<Arc<dyn VectorStore>>,
    manifest: Option<IndexManifest>,
    generator: Option<Arc<dyn TextGenerator>>,
    in_flight: Arc<AtomicUsize>,
    show_progress: bool,
}

/// Decrements the in-flight counter on every exit path. Owned so that a
/// returned token stream can carry it.
struct AnsweringGuard(Arc<AtomicUsize>);

impl AnsweringGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for AnsweringGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RagOrchestrator {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        let template = PromptTemplate::from_config(&config.prompt)?;
        Ok(Self {
            config,
            embedder,
            template,
            store: None,
            manifest: None,
            generator: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    pub fn state(&self) -> OrchestratorState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return OrchestratorState::Answering;
        }
        match (&self.store, &self.generator) {
            (None, _) => OrchestratorState::Idle,
            (Some(_), None) => OrchestratorState::IndexReady,
            (Some(_), Some(_)) => OrchestratorState::ModelReady,
        }
    }

    /// Loads, chunks and embeds the whole corpus, then persists it as a new
    /// build. Nothing is written until every chunk has an embedding, and the
    /// orchestrator keeps its previous index if any step fails.
    pub async fn build_index(&mut self, corpus_dir: &Path) -> Result<BuildStats> {
        let timer = OperationTimer::new("index build");

        let documents = CorpusLoader::new(&self.config.corpus).load(corpus_dir)?;
        let chunks = TextChunker::new(self.config.chunking).chunk_documents(&documents);
        if chunks.is_empty() {
            return Err(WorkbenchError::corpus(corpus_dir, "corpus produced no chunks"));
        }
        timer.checkpoint(&format!(
            "{} documents split into {} chunks",
            documents.len(),
            chunks.len()
        ));

        let dimension = self.embedder.dimension();
        let progress = EmbeddingProgress::new(
            documents.len(),
            chunks.len(),
            self.show_progress,
            self.show_progress,
        );
        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(WorkbenchError::index(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter().zip(vectors) {
                check_dimension(dimension, &embedding)?;
                entries.push(IndexedChunk {
                    chunk: chunk.clone(),
                    embedding,
                });
            }
            progress.inc(batch.len());
        }
        let mut stats = progress.finish();

        let manifest = IndexManifest::new(
            self.config.index.backend,
            &self.config.index.table_name,
            self.embedder.name(),
            dimension,
            documents.len(),
            entries.len(),
            self.config.chunking,
        );
        let store = index::persist(&self.config.index, &manifest, entries).await?;

        self.store = Some(store);
        self.manifest = Some(manifest);
        stats.duration_secs = timer.finish().as_secs_f64();
        Ok(stats)
    }

    /// Opens a persisted build. A missing or unreadable index is an `Index` error.
    pub async fn load_index(&mut self, storage: &Path) -> Result<()> {
        let timer = OperationTimer::new("index load");
        let index_config = IndexConfig {
            storage_path: storage.to_path_buf(),
            ..self.config.index.clone()
        };
        let (store, manifest) = index::open(&index_config).await?;

        if manifest.dimension != self.embedder.dimension() {
            return Err(WorkbenchError::index(format!(
                "index at {} has dimension {}, embedder {} produces {}",
                storage.display(),
                manifest.dimension,
                self.embedder.name(),
                self.embedder.dimension()
            )));
        }
        if manifest.embedder != self.embedder.name() {
            warn!(
                "Index was built with embedder {}, querying with {}",
                manifest.embedder,
                self.embedder.name()
            );
        }

        self.store = Some(store);
        self.manifest = Some(manifest);
        timer.finish();
        Ok(())
    }

    /// Loads the configured backend once. Requires an index.
    pub async fn load_model(&mut self) -> Result<()> {
        self.require_index("load_model")?;
        let timer = OperationTimer::new("model load");
        let generator = llm::load_generator(&self.config).await?;
        self.generator = Some(generator);
        timer.finish();
        Ok(())
    }

    /// Uses an already constructed generator instead of loading the configured one.
    pub fn attach_model(&mut self, generator: Arc<dyn TextGenerator>) -> Result<()> {
        self.require_index("attach_model")?;
        self.generator = Some(generator);
        Ok(())
    }

    /// Builds (when `rebuild`) or loads the index, then loads the model.
    pub async fn start(&mut self, rebuild: bool) -> Result<()> {
        if self.config.hardware.log_on_start {
            match hardware::collect_report(self.config.hardware.include_gpu) {
                Ok(report) => info!("Hardware report:\n{}", report.render()),
                Err(e) => warn!("Hardware report unavailable: {}", e),
            }
        }

        let storage = self.config.index.storage_path.clone();
        if rebuild {
            let corpus = self.config.corpus.directory.clone();
            let stats = self.build_index(&corpus).await?;
            info!(
                "Indexed {} chunks from {} documents",
                stats.chunks, stats.documents
            );
        } else {
            self.load_index(&storage).await?;
        }
        if self.generator.is_none() {
            self.load_model().await?;
        }
        Ok(())
    }

    pub fn retriever(&self) -> Result<Retriever> {
        let store = self.require_index("retrieve")?;
        Retriever::new(store, Arc::clone(&self.embedder), self.config.index.top_k)
    }

    pub fn adapter(&self) -> Result<Adapter> {
        let generator = self.generator.clone().ok_or(WorkbenchError::InvalidState {
            operation: "answer",
            required: "a loaded model (load_model)",
        })?;
        let retriever = self.retriever()?;
        let adapter = match self.config.model.backend {
            ModelBackend::Hosted => {
                Adapter::hosted(generator, Some((retriever, self.template.clone())))
            }
            ModelBackend::Llama => Adapter::local_rag(generator, retriever, self.template.clone()),
        };
        Ok(adapter.with_verbose(self.config.model.verbose))
    }

    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.retriever()?.retrieve_k(question, k).await
    }

    /// Collected text of [`RagOrchestrator::answer_stream`].
    pub async fn answer(&self, question: &str) -> Result<String> {
        let adapter = self.adapter()?;
        let _guard = AnsweringGuard::enter(&self.in_flight);
        let timer = OperationTimer::new("answer");
        let answer = adapter.answer(question).await?;
        timer.warn_if_slow(Duration::from_secs(120), "answer generation");
        timer.finish_with_count(answer.chars().count());
        Ok(answer)
    }

    /// The state reports `Answering` until the returned stream is dropped.
    pub async fn answer_stream(&self, question: &str) -> Result<TokenStream> {
        let adapter = self.adapter()?;
        let guard = AnsweringGuard::enter(&self.in_flight);
        let tokens = adapter.answer_stream(question).await?;
        Ok(tokens
            .map(move |piece| {
                let _held = &guard;
                piece
            })
            .boxed())
    }

    /// Answers each question in turn. A failure is recorded for that question
    /// and the loop continues.
    pub async fn answer_all<S: AsRef<str>>(&self, questions: &[S]) -> Vec<QuestionOutcome> {
        let mut outcomes = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            let question = question.as_ref();
            let result = self.answer(question).await;
            if let Err(e) = &result {
                error!("Question {} failed: {}", i + 1, e);
            }
            outcomes.push(QuestionOutcome {
                question: question.to_string(),
                result,
            });
        }
        outcomes
    }

    fn require_index(&self, operation: &'static str) -> Result<Arc<dyn VectorStore>> {
        self.store.clone().ok_or(WorkbenchError::InvalidState {
            operation,
            required: "an index (build_index or load_index)",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingProvider, IndexBackend};
    use crate::embedding::HashingEmbedder;
    use async_trait::async_trait;
    use futures::{StreamExt, stream};
    use std::fs;
    use tempfile::TempDir;

    /// Fails for questions mentioning "falha", otherwise answers with the prompt length.
    struct Scripted;

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
            if prompt.contains("falha") {
                return Err(WorkbenchError::generation("scripted failure"));
            }
            let pieces: Vec<Result<String>> =
                vec![Ok("resposta ".to_string()), Ok(format!("{}", prompt.len()))];
            Ok(stream::iter(pieces).boxed())
        }
    }

    /// Holds its single answer until the paired sender fires.
    struct Gated {
        release: std::sync::Mutex<Option<futures::channel::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl TextGenerator for Gated {
        fn name(&self) -> String {
            "gated".to_string()
        }

        async fn generate_stream(&self, _prompt: &str) -> Result<TokenStream> {
            let release = self.release.lock().unwrap().take();
            Ok(stream::once(async move {
                if let Some(rx) = release {
                    let _ = rx.await;
                }
                Ok("liberada".to_string())
            })
            .boxed())
        }
    }

    fn setup() -> (TempDir, RagOrchestrator) {
        let temp = TempDir::new().unwrap();
        let corpus = temp.path().join("corpus");
        fs::create_dir(&corpus).unwrap();
        fs::write(corpus.join("a.txt"), "X is a drought tolerant crop.\n\nIt is planted in spring.").unwrap();
        fs::write(corpus.join("b.txt"), "Y is a river that floods in winter.").unwrap();

        let mut config = Config::default_config();
        config.corpus.directory = corpus;
        config.index.backend = IndexBackend::Flat;
        config.index.storage_path = temp.path().join("index");
        config.embedding.provider = EmbeddingProvider::Hashing;
        config.embedding.dimension = 64;

        let embedder = Arc::new(HashingEmbedder::new(64));
        let orchestrator = RagOrchestrator::new(config, embedder).unwrap();
        (temp, orchestrator)
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (_temp, mut orchestrator) = setup();
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);

        let corpus = orchestrator.config().corpus.directory.clone();
        let stats = orchestrator.build_index(&corpus).await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.embedded, stats.chunks);
        assert_eq!(orchestrator.state(), OrchestratorState::IndexReady);

        orchestrator.attach_model(Arc::new(Scripted)).unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::ModelReady);

        let answer = orchestrator.answer("What is X?").await.unwrap();
        assert!(answer.starts_with("resposta "));
        assert_eq!(orchestrator.state(), OrchestratorState::ModelReady);
    }

    #[tokio::test]
    async fn test_operations_out_of_order_are_invalid_state() {
        let (_temp, mut orchestrator) = setup();
        assert!(matches!(
            orchestrator.attach_model(Arc::new(Scripted)),
            Err(WorkbenchError::InvalidState { .. })
        ));
        assert!(matches!(
            orchestrator.answer("What is X?").await,
            Err(WorkbenchError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_index() {
        let (temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        let build_id = orchestrator.manifest().unwrap().build_id;

        let result = orchestrator.build_index(&temp.path().join("missing")).await;
        assert!(matches!(result, Err(WorkbenchError::Corpus { .. })));
        assert_eq!(orchestrator.manifest().unwrap().build_id, build_id);
        assert_eq!(orchestrator.state(), OrchestratorState::IndexReady);
    }

    #[tokio::test]
    async fn test_load_index_after_build() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        let before = orchestrator.search("drought crop", 3).await.unwrap();

        let storage = orchestrator.config().index.storage_path.clone();
        let embedder = Arc::new(HashingEmbedder::new(64));
        let mut fresh = RagOrchestrator::new(orchestrator.config().clone(), embedder).unwrap();
        fresh.load_index(&storage).await.unwrap();
        assert_eq!(fresh.search("drought crop", 3).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_load_index_rejects_other_dimension() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();

        let mut config = orchestrator.config().clone();
        config.embedding.dimension = 32;
        let mut other = RagOrchestrator::new(config, Arc::new(HashingEmbedder::new(32))).unwrap();
        let storage = orchestrator.config().index.storage_path.clone();
        assert!(matches!(
            other.load_index(&storage).await,
            Err(WorkbenchError::Index { .. })
        ));
        assert_eq!(other.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_answer_all_continues_after_failure() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        orchestrator.attach_model(Arc::new(Scripted)).unwrap();

        let outcomes = orchestrator
            .answer_all(&["What is X?", "isto vai falha?", "What is Y?"])
            .await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());
    }

    #[tokio::test]
    async fn test_answer_stream_matches_answer() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        orchestrator.attach_model(Arc::new(Scripted)).unwrap();

        let streamed = llm::collect_stream(orchestrator.answer_stream("What is X?").await.unwrap())
            .await
            .unwrap();
        assert_eq!(streamed, orchestrator.answer("What is X?").await.unwrap());
    }

    #[tokio::test]
    async fn test_state_is_answering_while_answer_in_flight() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        let (tx, rx) = futures::channel::oneshot::channel();
        orchestrator
            .attach_model(Arc::new(Gated {
                release: std::sync::Mutex::new(Some(rx)),
            }))
            .unwrap();

        let answering = orchestrator.answer("What is X?");
        let observe = async {
            tokio::task::yield_now().await;
            let seen = orchestrator.state();
            tx.send(()).unwrap();
            seen
        };
        let (answer, seen) = tokio::join!(answering, observe);

        assert_eq!(seen, OrchestratorState::Answering);
        assert_eq!(answer.unwrap(), "liberada");
        assert_eq!(orchestrator.state(), OrchestratorState::ModelReady);
    }

    #[tokio::test]
    async fn test_state_is_answering_until_stream_dropped() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        orchestrator.attach_model(Arc::new(Scripted)).unwrap();

        let mut tokens = orchestrator.answer_stream("What is X?").await.unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Answering);
        assert_eq!(tokens.next().await.unwrap().unwrap(), "resposta ");
        assert_eq!(orchestrator.state(), OrchestratorState::Answering);

        drop(tokens);
        assert_eq!(orchestrator.state(), OrchestratorState::ModelReady);
    }

    #[tokio::test]
    async fn test_failed_stream_start_leaves_model_ready() {
        let (_temp, mut orchestrator) = setup();
        let corpus = orchestrator.config().corpus.directory.clone();
        orchestrator.build_index(&corpus).await.unwrap();
        orchestrator.attach_model(Arc::new(Scripted)).unwrap();

        assert!(orchestrator.answer_stream("isto vai falha?").await.is_err());
        assert_eq!(orchestrator.state(), OrchestratorState::ModelReady);
    }
}
