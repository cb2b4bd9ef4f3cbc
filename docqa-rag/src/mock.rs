//! Deterministic offline providers for tests, demos and air-gapped use.
//!
//! [`MockEmbeddingProvider`] hashes lowercase word tokens into a fixed number
//! of buckets (the "hashing trick"), so texts sharing words get similar
//! vectors. [`MockGenerator`] returns a canned reply and records every prompt.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::document::Embedding;
use crate::embedding::{EmbeddingProvider, check_input_len};
use crate::error::{GenerationFailure, RagError, Result};
use crate::generation::Generator;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Bag-of-words embeddings from hashed tokens, L2-normalised.
///
/// Same text always yields the same vector, independent of platform and
/// compiler version.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    max_input_chars: Option<usize>,
    unavailable: bool,
}

impl MockEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` components (at least one).
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1), max_input_chars: None, unavailable: false }
    }

    /// Reject inputs longer than `limit` characters.
    pub fn with_max_input_chars(mut self, limit: usize) -> Self {
        self.max_input_chars = Some(limit);
        self
    }

    /// Simulate a model that failed to load: every call errors.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn vectorize(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let bucket = fnv1a(token.to_lowercase().as_bytes()) % self.dimensions as u64;
            vector[bucket as usize] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        if self.unavailable {
            return Err(RagError::embedding(self.name(), "model not loaded"));
        }
        check_input_len(self.name(), text, self.max_input_chars)?;
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_input_chars
    }
}

/// A [`Generator`] that replies with fixed text and records the prompts it saw.
#[derive(Debug)]
pub struct MockGenerator {
    reply: String,
    failure: Option<GenerationFailure>,
    failures_left: AtomicUsize,
    max_prompt_chars: usize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Create a generator that always replies with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            failure: None,
            failures_left: AtomicUsize::new(0),
            max_prompt_chars: 100_000,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a generator whose every call fails with `kind`.
    pub fn failing(kind: GenerationFailure) -> Self {
        Self::new("").with_failures(usize::MAX, kind)
    }

    /// Fail the first `count` calls with `kind`, then reply normally.
    pub fn with_failures(mut self, count: usize, kind: GenerationFailure) -> Self {
        self.failure = Some(kind);
        self.failures_left = AtomicUsize::new(count);
        self
    }

    /// Set the prompt budget reported through [`Generator::max_prompt_chars`].
    pub fn with_max_prompt_chars(mut self, limit: usize) -> Self {
        self.max_prompt_chars = limit;
        self
    }

    /// Number of times [`Generator::generate`] was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());

        if let Some(kind) = self.failure {
            let remaining = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if remaining.is_ok() {
                return Err(RagError::generation(self.name(), kind, "simulated failure"));
            }
        }

        Ok(self.reply.clone())
    }

    fn max_prompt_chars(&self) -> usize {
        self.max_prompt_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_words_score_higher_than_disjoint_ones() {
        let provider = MockEmbeddingProvider::new(128);
        let q = provider.embed("the sky").await.unwrap();
        let near = provider.embed("The sky is blue").await.unwrap();
        let far = provider.embed("grass green").await.unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[tokio::test]
    async fn embedding_is_case_insensitive_and_normalised() {
        let provider = MockEmbeddingProvider::default();
        let a = provider.embed("Rust Ownership").await.unwrap();
        let b = provider.embed("rust ownership").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn generator_recovers_after_scripted_failures() {
        let generator = MockGenerator::new("ok").with_failures(1, GenerationFailure::Transport);
        assert!(generator.generate("p1").await.is_err());
        assert_eq!(generator.generate("p2").await.unwrap(), "ok");
        assert_eq!(generator.call_count(), 2);
        assert_eq!(generator.prompts().await, ["p1", "p2"]);
    }
}
