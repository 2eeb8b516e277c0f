// file: tests/end_to_end.rs
// description: corpus to answer flow through the public api

use async_trait::async_trait;
use futures::{StreamExt, stream};
use llm_workbench::config::{EmbeddingProvider, IndexBackend};
use llm_workbench::{
    Config, HashingEmbedder, ImagePipeline, RagOrchestrator, Result, TextGenerator, TokenStream,
    Transform,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records the prompt it receives and answers word by word.
#[derive(Default)]
struct Echo {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for Echo {
    fn name(&self) -> String {
        "echo".to_string()
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let words: Vec<Result<String>> = ["X ", "is ", "a ", "crop."]
            .iter()
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(stream::iter(words).boxed())
    }
}

fn workspace(backend: IndexBackend) -> (TempDir, Config) {
    let temp = TempDir::new().unwrap();
    let corpus = temp.path().join("corpus");
    fs::create_dir(&corpus).unwrap();
    fs::write(
        corpus.join("crops.txt"),
        "X is a drought tolerant crop grown on the plateau. Farmers plant X after the first rains.",
    )
    .unwrap();
    fs::write(
        corpus.join("rivers.txt"),
        "The river floods every winter and the valley stays wet until spring.",
    )
    .unwrap();
    fs::write(corpus.join("ignored.csv"), "not,part,of,the,corpus").unwrap();

    let mut config = Config::default_config();
    config.corpus.directory = corpus;
    config.index.backend = backend;
    config.index.storage_path = temp.path().join("index");
    config.embedding.provider = EmbeddingProvider::Hashing;
    config.embedding.dimension = 128;
    config.prompt.language = "English".to_string();
    (temp, config)
}

#[tokio::test]
async fn answers_question_from_two_document_corpus() {
    let (_temp, config) = workspace(IndexBackend::Flat);
    let corpus = config.corpus.directory.clone();
    let mut rag = RagOrchestrator::new(config, Arc::new(HashingEmbedder::new(128))).unwrap();

    let stats = rag.build_index(&corpus).await.unwrap();
    assert_eq!(stats.documents, 2);

    let echo = Arc::new(Echo::default());
    rag.attach_model(echo.clone()).unwrap();

    let answer = rag.answer("What is X?").await.unwrap();
    assert_eq!(answer, "X is a crop.");

    let prompts = echo.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Answer in English"));
    assert!(prompts[0].contains("What is X?"));
    assert!(prompts[0].contains("drought tolerant"));
}

#[tokio::test]
async fn lance_index_survives_reload() {
    let (_temp, config) = workspace(IndexBackend::Lance);
    let corpus = config.corpus.directory.clone();
    let storage = config.index.storage_path.clone();

    let mut first = RagOrchestrator::new(config.clone(), Arc::new(HashingEmbedder::new(128))).unwrap();
    first.build_index(&corpus).await.unwrap();
    let before = first.search("when does the river flood", 2).await.unwrap();
    assert_eq!(before.len(), 2);

    let mut second = RagOrchestrator::new(config, Arc::new(HashingEmbedder::new(128))).unwrap();
    second.load_index(&storage).await.unwrap();
    let after = second.search("when does the river flood", 2).await.unwrap();

    let ids = |hits: &[llm_workbench::RetrievedChunk]| {
        hits.iter().map(|h| h.chunk.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&after), ids(&before));
    for (a, b) in after.iter().zip(&before) {
        assert!((a.score - b.score).abs() < 1e-5);
    }
}

#[tokio::test]
async fn rebuild_replaces_previous_build() {
    let (_temp, config) = workspace(IndexBackend::Flat);
    let corpus = config.corpus.directory.clone();
    let storage = config.index.storage_path.clone();
    let mut rag = RagOrchestrator::new(config, Arc::new(HashingEmbedder::new(128))).unwrap();

    rag.build_index(&corpus).await.unwrap();
    let first = rag.manifest().unwrap().location.clone();
    rag.build_index(&corpus).await.unwrap();
    let second = rag.manifest().unwrap().location.clone();

    assert_ne!(first, second);
    assert!(!storage.join(&first).exists());
    assert!(storage.join(&second).exists());
}

#[test]
fn chained_transforms_match_individual_steps() {
    let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
    let mut chained = ImagePipeline::new(img.clone());
    let report = chained.apply_sequence(&["simple_blur", "black-hat"]);
    assert_eq!(report.applied, vec![Transform::Blur, Transform::BlackHat]);

    let stepwise = Transform::BlackHat.apply(&Transform::Blur.apply(&img));
    assert!(chained.current() == &stepwise);

    chained.restore();
    assert!(chained.current().as_raw() == img.as_raw());
}
