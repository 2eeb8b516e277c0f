// file: src/llm/adapter.rs
// description: uniform answer(prompt) surface over hosted, local and local+RAG backends
// reference: internal adapter layer

use super::{TextGenerator, TokenStream, collect_stream};
use crate::error::Result;
use crate::models::RetrievedChunk;
use crate::rag::{PromptTemplate, Retriever};
use crate::utils::Validator;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Hosted,
    Local,
    LocalRag,
}

impl AdapterKind {
    pub fn label(&self) -> &'static str {
        match self {
            AdapterKind::Hosted => "hosted",
            AdapterKind::Local => "local",
            AdapterKind::LocalRag => "local+rag",
        }
    }
}

/// A prompt ready for generation plus the chunks that went into it.
pub struct PreparedPrompt {
    pub prompt: String,
    pub context: Vec<RetrievedChunk>,
}

pub struct Adapter {
    kind: AdapterKind,
    generator: Arc<dyn TextGenerator>,
    retrieval: Option<(Retriever, PromptTemplate)>,
    verbose: bool,
}

impl Adapter {
    /// Hosted backend, optionally grounded on an index built or loaded elsewhere.
    pub fn hosted(
        generator: Arc<dyn TextGenerator>,
        retrieval: Option<(Retriever, PromptTemplate)>,
    ) -> Self {
        Self {
            kind: AdapterKind::Hosted,
            generator,
            retrieval,
            verbose: false,
        }
    }

    /// Local weights, prompt passed through untouched.
    pub fn local(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            kind: AdapterKind::Local,
            generator,
            retrieval: None,
            verbose: false,
        }
    }

    pub fn local_rag(
        generator: Arc<dyn TextGenerator>,
        retriever: Retriever,
        template: PromptTemplate,
    ) -> Self {
        Self {
            kind: AdapterKind::LocalRag,
            generator,
            retrieval: Some((retriever, template)),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    pub async fn prepare(&self, question: &str) -> Result<PreparedPrompt> {
        Validator::validate_question(question)?;
        match &self.retrieval {
            None => Ok(PreparedPrompt {
                prompt: question.to_string(),
                context: Vec::new(),
            }),
            Some((retriever, template)) => {
                let context = retriever.retrieve(question).await?;
                Ok(PreparedPrompt {
                    prompt: template.render(question, &context),
                    context,
                })
            }
        }
    }

    /// Collected text of [`Adapter::answer_stream`].
    pub async fn answer(&self, question: &str) -> Result<String> {
        let answer = collect_stream(self.answer_stream(question).await?).await?;
        if answer.trim().is_empty() {
            warn!(adapter = self.kind.label(), "Model returned an empty answer");
        } else if self.verbose {
            debug!(
                adapter = self.kind.label(),
                answer_chars = answer.chars().count(),
                "Answer: {}",
                Validator::truncate_text(&answer, 200)
            );
        }
        Ok(answer)
    }

    pub async fn answer_stream(&self, question: &str) -> Result<TokenStream> {
        let prepared = self.prepare(question).await?;
        self.log_prompt(&prepared);
        self.generator.generate_stream(&prepared.prompt).await
    }

    fn log_prompt(&self, prepared: &PreparedPrompt) {
        if self.verbose {
            debug!(
                adapter = self.kind.label(),
                generator = %self.generator.name(),
                context_chunks = prepared.context.len(),
                prompt_chars = prepared.prompt.chars().count(),
                "Prompt: {}",
                Validator::truncate_text(&prepared.prompt, 400)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashingEmbedder};
    use crate::error::WorkbenchError;
    use crate::index::{FlatStore, IndexedChunk, VectorStore};
    use crate::models::Chunk;
    use async_trait::async_trait;
    use futures::{StreamExt, stream};
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed reply.
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        fn name(&self) -> String {
            "recorder".to_string()
        }

        async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let pieces: Vec<Result<String>> = vec![Ok("X é ".to_string()), Ok("uma cultura.".to_string())];
            Ok(stream::iter(pieces).boxed())
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn retriever() -> Retriever {
        let embedder = HashingEmbedder::new(128);
        let entries = ["X is a crop grown in the south", "Y is a river"]
            .iter()
            .enumerate()
            .map(|(i, t)| IndexedChunk {
                chunk: Chunk::new("doc.txt", i, 0, t.to_string()),
                embedding: embedder.embed_text(t),
            })
            .collect();
        let store: Arc<dyn VectorStore> = Arc::new(FlatStore::new(128, entries).unwrap());
        Retriever::new(store, Arc::new(embedder) as Arc<dyn Embedder>, 1).unwrap()
    }

    #[tokio::test]
    async fn test_local_passes_prompt_through() {
        let generator = recorder();
        let adapter = Adapter::local(generator.clone());
        let answer = adapter.answer("Diga olá").await.unwrap();
        assert_eq!(answer, "X é uma cultura.");
        assert_eq!(generator.prompts.lock().unwrap()[0], "Diga olá");
        assert_eq!(adapter.kind(), AdapterKind::Local);
    }

    #[tokio::test]
    async fn test_local_rag_renders_context() {
        let generator = recorder();
        let template = PromptTemplate::new("{context} || {question}", "en").unwrap();
        let adapter = Adapter::local_rag(generator.clone(), retriever(), template).with_verbose(true);
        adapter.answer("What is X crop?").await.unwrap();
        assert_eq!(
            generator.prompts.lock().unwrap()[0],
            "X is a crop grown in the south || What is X crop?"
        );
    }

    #[tokio::test]
    async fn test_hosted_without_index_is_raw() {
        let generator = recorder();
        let adapter = Adapter::hosted(generator.clone(), None);
        let prepared = adapter.prepare("pergunta").await.unwrap();
        assert_eq!(prepared.prompt, "pergunta");
        assert!(prepared.context.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let adapter = Adapter::local(recorder());
        let err = adapter.answer("   ").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
    }
}
