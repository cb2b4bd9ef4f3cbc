//! # docqa-rag
//!
//! Retrieval-augmented question answering over a single document.
//!
//! ## Overview
//!
//! A document is split into overlapping text units, each unit is embedded,
//! and the vectors are kept in an immutable in-memory index. A question is
//! embedded the same way, the closest units are retrieved, and a generator
//! answers from those units only, reporting which ones it was given.
//!
//! - [`RagPipeline`] - `ingest` a document once, then `ask` many questions
//! - [`DocumentSession`] - one document per user, rejects questions before ingest
//! - [`RecursiveChunker`] / [`FixedSizeChunker`] - text splitting
//! - [`VectorIndex`] - exact cosine nearest-neighbour search
//! - [`AnswerSynthesizer`] - bounded, grounded prompts with citations
//!
//! ## Providers
//!
//! | Provider | Feature | Notes |
//! |----------|---------|-------|
//! | [`MockEmbeddingProvider`], [`MockGenerator`] | always | deterministic, offline |
//! | `GeminiEmbeddingProvider`, `GeminiGenerator` | `gemini` | Generative Language REST API |
//! | `LocalEmbeddingProvider` | `local` | all-MiniLM-L6-v2 via candle |
//!
//! PDF text extraction needs the `pdf` feature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use docqa_rag::{DocumentSession, MockEmbeddingProvider, MockGenerator, RagPipeline};
//!
//! # async fn run() -> docqa_rag::Result<()> {
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::default()))
//!     .generator(Arc::new(MockGenerator::new("Blue.")))
//!     .build()?;
//!
//! let mut session = DocumentSession::new(Arc::new(pipeline));
//! session.ingest_bytes(b"The sky is blue. Grass is green.", "text/plain").await?;
//! let answer = session.ask("What color is the sky?").await?;
//! println!("{} ({} sources)", answer.text, answer.cited_units.len());
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod generation;
pub mod index;
pub mod loader;
#[cfg(feature = "local")]
pub mod local;
pub mod mock;
pub mod pipeline;
pub mod retriever;
pub mod session;
pub mod synthesis;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, split};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, DocumentText, Embedding, IndexEntry, RetrievalResult, ScoredUnit, Section, TextUnit,
};
pub use embedding::EmbeddingProvider;
pub use error::{GenerationFailure, RagError, Result};
#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiEmbeddingProvider, GeminiGenerator};
pub use generation::{Generator, RetryPolicy};
pub use index::{IndexHandle, VectorIndex, cosine_similarity};
pub use loader::{extract_text, media_type_for_path};
#[cfg(feature = "local")]
pub use local::LocalEmbeddingProvider;
pub use mock::{MockEmbeddingProvider, MockGenerator};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::{Retriever, retrieve};
pub use session::DocumentSession;
pub use synthesis::{AnswerSynthesizer, INSUFFICIENT_INFORMATION};
