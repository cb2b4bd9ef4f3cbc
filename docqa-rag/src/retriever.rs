//! Top-k retrieval: embed the question, search the index.

use tracing::{debug, error};

use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Embed `query_text` and return the `k` nearest units from `index`.
///
/// # Errors
///
/// Returns [`RagError::InvalidQuery`] for a blank query or `k == 0`, and
/// propagates embedding and dimension errors unchanged.
pub async fn retrieve(
    query_text: &str,
    k: usize,
    embedder: &dyn EmbeddingProvider,
    index: &VectorIndex,
) -> Result<RetrievalResult> {
    if query_text.trim().is_empty() {
        return Err(RagError::InvalidQuery("question must not be empty".to_string()));
    }

    let vector = embedder.embed_query(query_text).await.map_err(|e| {
        error!(provider = embedder.name(), error = %e, "embedding failed during query");
        e
    })?;

    index.query(&vector, k)
}

/// A top-k retrieval policy with an optional similarity floor.
///
/// Holds no state besides its settings; the embedder and index are passed in
/// per call so one retriever can serve any session.
#[derive(Debug, Clone, PartialEq)]
pub struct Retriever {
    top_k: usize,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    /// Create a retriever returning at most `top_k` units.
    pub fn new(top_k: usize) -> Self {
        Self { top_k, similarity_threshold: None }
    }

    /// Create a retriever from pipeline settings.
    pub fn from_config(config: &RagConfig) -> Self {
        Self { top_k: config.top_k, similarity_threshold: config.similarity_threshold }
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Number of units requested from the index.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve context for `query_text`.
    pub async fn retrieve(
        &self,
        query_text: &str,
        embedder: &dyn EmbeddingProvider,
        index: &VectorIndex,
    ) -> Result<RetrievalResult> {
        let mut results = retrieve(query_text, self.top_k, embedder, index).await?;
        if let Some(threshold) = self.similarity_threshold {
            results.retain(|r| r.score >= threshold);
        }
        debug!(result_count = results.len(), top_k = self.top_k, "retrieved context");
        Ok(results)
    }
}
