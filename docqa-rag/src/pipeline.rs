//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the full ingest-and-ask workflow by
//! composing an [`EmbeddingProvider`], a [`Chunker`], a [`Retriever`] and an
//! [`AnswerSynthesizer`] backed by a [`Generator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{DocumentText, MockEmbeddingProvider, MockGenerator, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::default()))
//!     .generator(Arc::new(MockGenerator::new("Blue.")))
//!     .build()?;
//!
//! let index = pipeline.ingest(&DocumentText::new(text)).await?;
//! let answer = pipeline.ask("What color is the sky?", &index).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Answer, DocumentText, IndexEntry, RetrievalResult};
use crate::embedding::{EmbeddingProvider, check_batch_len};
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::{IndexHandle, VectorIndex};
use crate::retriever::Retriever;
use crate::synthesis::AnswerSynthesizer;

/// The RAG pipeline orchestrator.
///
/// Coordinates ingestion (chunk → embed → index) and question answering
/// (embed → search → synthesize). The pipeline itself holds no per-document
/// state: [`ingest`](RagPipeline::ingest) returns an [`IndexHandle`] that the
/// caller keeps and passes back to [`ask`](RagPipeline::ask). Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    generator: Arc<dyn Generator>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Ingest a document: chunk → embed → build index.
    ///
    /// Either the whole document is indexed or no index is produced.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] if the document has no visible text,
    /// and propagates [`RagError::Embedding`] and
    /// [`RagError::DimensionMismatch`] from the embedding step.
    pub async fn ingest(&self, document: &DocumentText) -> Result<IndexHandle> {
        if document.is_blank() {
            error!("refusing to ingest a document without text");
            return Err(RagError::Ingestion("document contains no text".to_string()));
        }

        // 1. Chunk the document
        let units = self.chunker.split(document);

        // 2. Generate embeddings for every unit in one batch
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        let provider = self.embedding_provider.name();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            let unit_count = units.len();
            error!(provider, unit_count, error = %e, "embedding failed during ingestion");
            e
        })?;
        check_batch_len(provider, units.len(), embeddings.len())?;

        let expected = self.embedding_provider.dimensions();
        if let Some(found) = embeddings.iter().map(Vec::len).find(|&len| len != expected) {
            error!(provider, expected, found, "provider returned vectors of the wrong dimension");
            return Err(RagError::DimensionMismatch { expected, found });
        }

        // 3. Build the index
        let entries: Vec<IndexEntry> = units
            .into_iter()
            .zip(embeddings)
            .map(|(unit, vector)| IndexEntry { unit, vector })
            .collect();
        let index = VectorIndex::build(entries)?;

        info!(unit_count = index.len(), dimensions = expected, "ingested document");
        Ok(Arc::new(index))
    }

    /// Retrieve the top-k units for `query` from `index`.
    pub async fn retrieve(&self, query: &str, index: &VectorIndex) -> Result<RetrievalResult> {
        self.retriever.retrieve(query, self.embedding_provider.as_ref(), index).await
    }

    /// Answer `query` from the document behind `index`.
    ///
    /// Failures affect only this question; the index stays usable.
    pub async fn ask(&self, query: &str, index: &VectorIndex) -> Result<Answer> {
        let context = self.retrieve(query, index).await?;
        self.synthesizer.answer(query, &context, self.generator.as_ref()).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider and generator are required. The config defaults to
/// [`RagConfig::default`] and the chunker to a [`RecursiveChunker`] built from
/// that config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    generator: Option<Arc<dyn Generator>>,
    synthesizer: Option<AnswerSynthesizer>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the generation capability.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set a custom answer synthesizer.
    pub fn synthesizer(mut self, synthesizer: AnswerSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&config)?),
        };

        Ok(RagPipeline {
            retriever: Retriever::from_config(&config),
            synthesizer: self.synthesizer.unwrap_or_default(),
            config,
            embedding_provider,
            chunker,
            generator,
        })
    }
}
