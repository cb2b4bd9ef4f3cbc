//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::document::Embedding;
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (local model, Gemini, a
/// deterministic stub) behind a unified async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// Providers must be deterministic for a fixed configuration and must reject
/// over-long input with [`RagError::Embedding`] rather than truncating it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate the embedding for a question.
    ///
    /// Defaults to [`embed`](EmbeddingProvider::embed); providers whose models
    /// embed queries and documents differently override it.
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed(text).await
    }

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The output has the same length and order as `texts`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Longest input, in characters, the provider accepts. `None` means unbounded.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }
}

/// Reject `text` if it is longer than `limit` characters.
pub(crate) fn check_input_len(provider: &str, text: &str, limit: Option<usize>) -> Result<()> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let len = text.chars().count();
    if len > limit {
        return Err(RagError::embedding(
            provider,
            format!(
                "input of {len} characters exceeds the limit of {limit}; \
                 re-chunk with a smaller chunk_size"
            ),
        ));
    }
    Ok(())
}

/// Check that a provider returned one vector per input.
pub(crate) fn check_batch_len(provider: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(RagError::embedding(
            provider,
            format!("provider returned {found} embeddings for {expected} inputs"),
        ));
    }
    Ok(())
}
