//! End-to-end tests for ingestion, retrieval and answering with offline providers.

use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::{
    DocumentSession, DocumentText, Embedding, EmbeddingProvider, GenerationFailure,
    MockEmbeddingProvider, MockGenerator, RagConfig, RagError, RagPipeline, Result,
};

const SKY_AND_GRASS: &[u8] = b"Page1: The sky is blue. Page2: Grass is green.";

fn small_config(top_k: usize) -> RagConfig {
    RagConfig::builder().chunk_size(20).chunk_overlap(5).top_k(top_k).build().unwrap()
}

fn pipeline(config: RagConfig, generator: MockGenerator) -> Arc<RagPipeline> {
    Arc::new(
        RagPipeline::builder()
            .config(config)
            .embedding_provider(Arc::new(MockEmbeddingProvider::default()))
            .generator(Arc::new(generator))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn answers_from_the_most_relevant_unit() {
    let generator = MockGenerator::new("The sky is blue.");
    let mut session = DocumentSession::new(pipeline(small_config(1), generator));
    let index = session.ingest_bytes(SKY_AND_GRASS, "text/plain").await.unwrap();
    assert!(index.len() > 1);

    let answer = session.ask("What color is the sky?").await.unwrap();
    assert_eq!(answer.text, "The sky is blue.");
    assert!(answer.grounded);
    assert_eq!(answer.cited_units.len(), 1);
    assert!(answer.cited_units[0].text.contains("The sky is"));
}

#[tokio::test]
async fn retrieval_returns_min_k_n_units() {
    let pipeline = pipeline(small_config(10), MockGenerator::new("ok"));
    let doc = DocumentText::new("Page1: The sky is blue. Page2: Grass is green.");
    let index = pipeline.ingest(&doc).await.unwrap();

    let results = pipeline.retrieve("sky", &index).await.unwrap();
    assert_eq!(results.len(), index.len());
    let top = results.top().unwrap();
    assert!(top.unit.text.to_lowercase().contains("sky"));
}

#[tokio::test]
async fn empty_document_fails_and_session_rejects_questions() {
    let mut session =
        DocumentSession::new(pipeline(RagConfig::default(), MockGenerator::new("ok")));

    let err = session.ingest_bytes(b"", "text/plain").await.unwrap_err();
    assert!(matches!(err, RagError::Ingestion(_)));
    assert!(!session.has_document());
    assert!(matches!(session.ask("anything?").await, Err(RagError::NoDocument)));
}

#[tokio::test]
async fn failed_reingest_clears_previous_document() {
    let mut session = DocumentSession::new(pipeline(small_config(2), MockGenerator::new("ok")));
    session.ingest_bytes(SKY_AND_GRASS, "text/plain").await.unwrap();
    assert!(session.has_document());

    assert!(session.ingest_bytes(b" \n\t ", "text/plain").await.is_err());
    assert!(!session.has_document());
    assert!(matches!(session.ask("What color is the sky?").await, Err(RagError::NoDocument)));
}

#[tokio::test]
async fn generation_failure_leaves_index_usable() {
    let generator = MockGenerator::new("Green.").with_failures(1, GenerationFailure::RateLimited);
    let mut session = DocumentSession::new(pipeline(small_config(2), generator));
    session.ingest_bytes(SKY_AND_GRASS, "text/plain").await.unwrap();

    let err = session.ask("What color is the grass?").await.unwrap_err();
    assert_eq!(err.generation_failure(), Some(GenerationFailure::RateLimited));
    assert!(err.user_message().contains("rate limit"));

    let answer = session.ask("What color is the grass?").await.unwrap();
    assert_eq!(answer.text, "Green.");
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let mut session = DocumentSession::new(pipeline(small_config(2), MockGenerator::new("ok")));
    session.ingest_bytes(SKY_AND_GRASS, "text/plain").await.unwrap();
    assert!(matches!(session.ask("   ").await, Err(RagError::InvalidQuery(_))));
}

#[tokio::test]
async fn unavailable_embedder_aborts_ingestion() {
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(MockEmbeddingProvider::default().unavailable()))
        .generator(Arc::new(MockGenerator::new("ok")))
        .build()
        .unwrap();
    let err = pipeline.ingest(&DocumentText::new("Some text.")).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));
}

#[tokio::test]
async fn over_long_unit_is_an_embedding_error() {
    let pipeline = RagPipeline::builder()
        .config(small_config(2))
        .embedding_provider(Arc::new(MockEmbeddingProvider::default().with_max_input_chars(10)))
        .generator(Arc::new(MockGenerator::new("ok")))
        .build()
        .unwrap();
    let doc = DocumentText::new("A sentence that is longer than ten characters.");
    let err = pipeline.ingest(&doc).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));
}

#[tokio::test]
async fn embeddings_are_deterministic() {
    let provider = MockEmbeddingProvider::default();
    let texts = ["The sky is blue.", "Grass is green."];
    let first = provider.embed_batch(&texts).await.unwrap();
    let second = provider.embed_batch(&texts).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0], provider.embed("The sky is blue.").await.unwrap());
}

/// Declares one dimension and returns another.
struct LyingProvider;

#[async_trait]
impl EmbeddingProvider for LyingProvider {
    fn name(&self) -> &str {
        "Lying"
    }

    async fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(vec![1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        3
    }
}

#[tokio::test]
async fn provider_dimension_mismatch_aborts_ingestion() {
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(LyingProvider))
        .generator(Arc::new(MockGenerator::new("ok")))
        .build()
        .unwrap();
    let err = pipeline.ingest(&DocumentText::new("Some text.")).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, found: 2 }));
}

#[test]
fn builder_requires_providers() {
    let err =
        RagPipeline::builder().generator(Arc::new(MockGenerator::new("ok"))).build().err().unwrap();
    assert!(matches!(err, RagError::Config(_)));

    let bad = RagConfig { chunk_overlap: 1000, ..RagConfig::default() };
    let err = RagPipeline::builder()
        .config(bad)
        .embedding_provider(Arc::new(MockEmbeddingProvider::default()))
        .generator(Arc::new(MockGenerator::new("ok")))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::Config(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_questions_share_one_index() {
    let pipeline = pipeline(small_config(2), MockGenerator::new("ok"));
    let doc = DocumentText::new("Page1: The sky is blue. Page2: Grass is green.");
    let index = pipeline.ingest(&doc).await.unwrap();

    let handles: Vec<_> = ["sky", "grass", "blue", "green"]
        .into_iter()
        .map(|q| {
            let pipeline = Arc::clone(&pipeline);
            let index = Arc::clone(&index);
            tokio::spawn(async move { pipeline.ask(q, &index).await })
        })
        .collect();

    for handle in handles {
        let answer = handle.await.unwrap().unwrap();
        assert_eq!(answer.cited_units.len(), 2);
    }
}
