//! Local sentence embeddings with candle.
//!
//! Runs `sentence-transformers/all-MiniLM-L6-v2` on the CPU (or CUDA when
//! available): 384 dimensions, 256 tokens per input, mean pooling followed by
//! L2 normalisation. Weights are fetched from the Hugging Face Hub on first
//! use and shared by every provider in the process.
//!
//! This module is only available when the `local` feature is enabled.

use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::tokio::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::document::Embedding;
use crate::embedding::{EmbeddingProvider, check_batch_len};
use crate::error::{RagError, Result};

const PROVIDER: &str = "Local";

/// Hugging Face Hub model identifier.
pub const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

const EMBEDDING_DIM: usize = 384;

/// Longest input in tokens, including `[CLS]` and `[SEP]`.
pub const MAX_TOKENS: usize = 256;

const BATCH_SIZE: usize = 32;

static MODEL: OnceCell<Arc<LoadedModel>> = OnceCell::const_new();

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

fn load_error(message: String) -> RagError {
    RagError::embedding(PROVIDER, format!("model unavailable: {message}"))
}

fn inference_error(message: String) -> RagError {
    RagError::embedding(PROVIDER, format!("inference failed: {message}"))
}

async fn load_model() -> Result<Arc<LoadedModel>> {
    info!(model = MODEL_ID, "loading local embedding model");

    let api = Api::new().map_err(|e| load_error(format!("failed to create HF API: {e}")))?;
    let repo = api.repo(Repo::new(MODEL_ID.to_string(), RepoType::Model));

    debug!("fetching tokenizer");
    let tokenizer_path = repo
        .get("tokenizer.json")
        .await
        .map_err(|e| load_error(format!("failed to download tokenizer: {e}")))?;
    debug!("fetching config");
    let config_path = repo
        .get("config.json")
        .await
        .map_err(|e| load_error(format!("failed to download config: {e}")))?;
    debug!("fetching weights");
    let weights_path = repo
        .get("model.safetensors")
        .await
        .map_err(|e| load_error(format!("failed to download weights: {e}")))?;

    tokio::task::spawn_blocking(move || {
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| load_error(format!("failed to load tokenizer: {e}")))?;
        // Over-long inputs must fail rather than be cut silently.
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| load_error(format!("failed to configure tokenizer: {e}")))?;

        let config = std::fs::read_to_string(&config_path)
            .map_err(|e| load_error(format!("failed to read config: {e}")))?;
        let config: Config = serde_json::from_str(&config)
            .map_err(|e| load_error(format!("failed to parse config: {e}")))?;

        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        // SAFETY: the safetensors file comes from the Hub cache and is only read.
        #[allow(unsafe_code)]
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| load_error(format!("failed to load weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| load_error(format!("failed to build model: {e}")))?;

        info!(model = MODEL_ID, ?device, "local embedding model ready");
        Ok(Arc::new(LoadedModel { model, tokenizer, device }))
    })
    .await
    .map_err(|e| load_error(format!("model loading task failed: {e}")))?
}

impl LoadedModel {
    /// Embed one batch; every text must already be within [`MAX_TOKENS`].
    fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| inference_error(format!("tokenization failed: {e}")))?;

        if let Some((i, encoding)) =
            encodings.iter().enumerate().find(|(_, e)| e.len() > MAX_TOKENS)
        {
            let len = encoding.len();
            return Err(RagError::embedding(
                PROVIDER,
                format!("input {i} is {len} tokens, above the model limit of {MAX_TOKENS}"),
            ));
        }

        let batch = encodings.len();
        let max_len = encodings.iter().map(|e| e.len()).max().unwrap_or(0);
        let mut ids = Vec::with_capacity(batch * max_len);
        let mut mask = Vec::with_capacity(batch * max_len);
        for encoding in &encodings {
            let len = encoding.len();
            ids.extend_from_slice(encoding.get_ids());
            ids.extend(std::iter::repeat_n(0u32, max_len - len));
            mask.extend(std::iter::repeat_n(1u32, len));
            mask.extend(std::iter::repeat_n(0u32, max_len - len));
        }

        let tensor = |data: Vec<u32>| {
            Tensor::from_vec(data, (batch, max_len), &self.device)
                .map_err(|e| inference_error(format!("failed to build input tensor: {e}")))
        };
        let input_ids = tensor(ids)?;
        let attention_mask = tensor(mask)?;
        let token_type_ids = input_ids.zeros_like().map_err(|e| inference_error(e.to_string()))?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| inference_error(format!("forward pass failed: {e}")))?;

        let pooled = mean_pool(&output, &attention_mask)
            .map_err(|e| inference_error(format!("pooling failed: {e}")))?;
        let normalized = normalize(&pooled)
            .map_err(|e| inference_error(format!("normalisation failed: {e}")))?;
        normalized
            .to_vec2::<f32>()
            .map_err(|e| inference_error(format!("failed to read embeddings: {e}")))
    }
}

fn mean_pool(tokens: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?.broadcast_as(tokens.shape())?;
    let sum = tokens.mul(&mask)?.sum(1)?;
    let count = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    sum.div(&count)
}

fn normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    let norm = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    embeddings.broadcast_div(&norm)
}

/// An [`EmbeddingProvider`] running all-MiniLM-L6-v2 in-process.
///
/// Creating a provider is cheap; the model is loaded on the first embedding
/// call and kept for the rest of the process. A download or load failure is
/// reported as [`RagError::Embedding`] and retried on the next call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEmbeddingProvider;

impl LocalEmbeddingProvider {
    /// Create a provider. Nothing is downloaded until the first embedding call
    /// or [`warm_up`](Self::warm_up).
    pub fn new() -> Self {
        Self
    }

    /// Load the model now instead of on first use.
    pub async fn warm_up(&self) -> Result<()> {
        model().await.map(|_| ())
    }
}

async fn model() -> Result<Arc<LoadedModel>> {
    MODEL.get_or_try_init(load_model).await.cloned()
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = model().await?;

        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let owned: Vec<String> = batch.iter().map(|t| t.to_string()).collect();
            let model = Arc::clone(&model);
            let embedded = tokio::task::spawn_blocking(move || model.encode(&owned))
                .await
                .map_err(|e| inference_error(format!("embedding task failed: {e}")))??;
            check_batch_len(PROVIDER, batch.len(), embedded.len())?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_model_shape() {
        let provider = LocalEmbeddingProvider::new();
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.name(), "Local");
        assert_eq!(provider.max_input_chars(), None);
    }

    #[tokio::test]
    #[ignore] // downloads the model
    async fn embeddings_are_unit_length_and_deterministic() {
        let provider = LocalEmbeddingProvider::new();
        let first = provider.embed_batch(&["The sky is blue.", "Grass is green."]).await.unwrap();
        let again = provider.embed("The sky is blue.").await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].len(), 384);
        let norm: f32 = first[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        // Padding inside the batch may move the last bits.
        let similarity: f32 = first[0].iter().zip(&again).map(|(a, b)| a * b).sum();
        assert!(similarity > 0.9999);
    }

    #[tokio::test]
    #[ignore] // downloads the model
    async fn over_long_input_is_rejected() {
        let long = "word ".repeat(1_000);
        let err = LocalEmbeddingProvider::new().embed(&long).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }
}
