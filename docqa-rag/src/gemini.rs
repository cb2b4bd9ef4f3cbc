//! Gemini generation and embedding providers over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::Embedding;
use crate::embedding::{EmbeddingProvider, check_batch_len, check_input_len};
use crate::error::{GenerationFailure, RagError, Result};
use crate::generation::{Generator, RetryPolicy};

const PROVIDER: &str = "Gemini";

/// The public Generative Language API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Environment variable read by [`GeminiConfig::from_env`].
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Dimensionality of `text-embedding-004`.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

/// `text-embedding-004` accepts 2048 tokens; four characters per token keeps clear of it.
const DEFAULT_MAX_EMBED_CHARS: usize = 8_000;

/// Requests per `batchEmbedContents` call accepted by the API.
const MAX_EMBED_BATCH: usize = 100;

/// Settings shared by the Gemini providers.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model used for answers.
    pub model: String,
    /// Model used for embeddings.
    pub embedding_model: String,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// API base URL, ending with a slash.
    pub base_url: String,
    /// Largest prompt, in characters, sent for one answer.
    pub max_prompt_chars: usize,
    /// Retries after a transient failure.
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_prompt_chars: 200_000,
            max_retries: 1,
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GeminiConfig {
    /// Default settings with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Self::default() }
    }

    /// Default settings with the key taken from `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            RagError::generation(
                PROVIDER,
                GenerationFailure::Unauthorized,
                format!("{API_KEY_ENV} environment variable not set"),
            )
        })?;
        Ok(Self::new(api_key))
    }

    /// Set the answer model (e.g. `gemini-2.5-pro`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Point the providers at another endpoint (proxy, emulator).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }
}

/// The HTTP plumbing shared by both providers.
#[derive(Debug, Clone)]
struct GeminiHttp {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GeminiHttp {
    fn new(config: &GeminiConfig) -> Result<Self> {
        let unauthorized = |message: &str| {
            RagError::generation(PROVIDER, GenerationFailure::Unauthorized, message.to_string())
        };
        if config.api_key.trim().is_empty() {
            return Err(unauthorized("API key must not be empty"));
        }
        let key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|_| unauthorized("API key contains invalid characters"))?;
        let headers = HeaderMap::from_iter([(HeaderName::from_static("x-goog-api-key"), key)]);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| {
                let message = format!("failed to create HTTP client: {e}");
                RagError::generation(PROVIDER, GenerationFailure::Transport, message)
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            retry: RetryPolicy::new(config.max_retries, Duration::from_millis(500)),
        })
    }

    /// POST `body` to `{base_url}{path}` with the retry policy applied.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        self.retry.execute(PROVIDER, || self.post_once(&url, body)).await
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self.client.post(url).json(body).send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            let message = format!("request failed: {e}");
            RagError::generation(PROVIDER, GenerationFailure::Transport, message)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.clone());
            let kind = classify_status(status.as_u16(), &body);
            error!(provider = PROVIDER, %status, %kind, "API error");
            let message = format!("API returned {status}: {detail}");
            return Err(RagError::generation(PROVIDER, kind, message));
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            let message = format!("failed to parse response: {e}");
            RagError::generation(PROVIDER, GenerationFailure::Unavailable, message)
        })
    }
}

/// Map an HTTP error status to a failure kind.
///
/// Gemini reports an invalid key as `400 INVALID_ARGUMENT` with reason
/// `API_KEY_INVALID`, so the body is inspected as well.
fn classify_status(status: u16, body: &str) -> GenerationFailure {
    match status {
        401 | 403 => GenerationFailure::Unauthorized,
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            GenerationFailure::Unauthorized
        }
        429 => GenerationFailure::RateLimited,
        500..=599 => GenerationFailure::Unavailable,
        _ => GenerationFailure::Rejected,
    }
}

// ── Generative Language API request/response types ─────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String> {
        let reject =
            |message: String| RagError::generation(PROVIDER, GenerationFailure::Rejected, message);

        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(reject(format!("prompt blocked: {reason}")));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(reject(format!("empty answer (finish reason {reason})")));
        }
        Ok(text)
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}

// ── Generator implementation ───────────────────────────────────────

/// A [`Generator`] backed by `models/{model}:generateContent`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::gemini::{GeminiConfig, GeminiGenerator};
///
/// let generator = GeminiGenerator::new(GeminiConfig::from_env()?)?;
/// let text = generator.generate("Say hello").await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    http: GeminiHttp,
    model: String,
    temperature: f32,
    max_prompt_chars: usize,
}

impl GeminiGenerator {
    /// Create a generator.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Generation`] with [`GenerationFailure::Unauthorized`]
    /// if the API key is empty or not a valid header value.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self {
            http: GeminiHttp::new(&config)?,
            model: model_path(&config.model),
            temperature: config.temperature,
            max_prompt_chars: config.max_prompt_chars,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = prompt.len(),
            "generating answer"
        );

        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig { temperature: self.temperature },
        };
        let response: GenerateContentResponse =
            self.http.post(&format!("{}:generateContent", self.model), &request).await?;
        response.into_text()
    }

    fn max_prompt_chars(&self) -> usize {
        self.max_prompt_chars
    }
}

// ── EmbeddingProvider implementation ───────────────────────────────

/// An [`EmbeddingProvider`] backed by `models/{model}:batchEmbedContents`.
///
/// # Configuration
///
/// - task types: `RETRIEVAL_DOCUMENT` for document text and `RETRIEVAL_QUERY`
///   for questions; override with [`GeminiEmbeddingProvider::with_task_types`].
/// - `dimensions` – 768 for `text-embedding-004`; override with
///   [`GeminiEmbeddingProvider::with_dimensions`] for other models.
pub struct GeminiEmbeddingProvider {
    http: GeminiHttp,
    model: String,
    document_task_type: String,
    query_task_type: String,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the API key is unusable.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self {
            http: GeminiHttp::new(&config).map_err(into_embedding_error)?,
            model: model_path(&config.embedding_model),
            document_task_type: "RETRIEVAL_DOCUMENT".to_string(),
            query_task_type: "RETRIEVAL_QUERY".to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Set the task types sent for document text and for questions
    /// (e.g. `SEMANTIC_SIMILARITY` for both).
    pub fn with_task_types(
        mut self,
        document: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        self.document_task_type = document.into();
        self.query_task_type = query.into();
        self
    }

    /// Declare the dimensionality of the configured model.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    async fn embed_with_task(&self, texts: &[&str], task_type: &str) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            check_input_len(PROVIDER, text, self.max_input_chars())?;
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            task_type,
            "embedding batch"
        );

        let path = format!("{}:batchEmbedContents", self.model);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let request = BatchEmbedContentsRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedContentRequest {
                        model: &self.model,
                        content: Content { role: None, parts: vec![Part { text }] },
                        task_type,
                    })
                    .collect(),
            };
            let response: BatchEmbedContentsResponse =
                self.http.post(&path, &request).await.map_err(into_embedding_error)?;
            check_batch_len(PROVIDER, batch.len(), response.embeddings.len())?;
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }
        Ok(vectors)
    }
}

/// Re-tag an HTTP failure as an embedding error, keeping its kind.
fn into_embedding_error(e: RagError) -> RagError {
    match e {
        RagError::Generation { kind, message, .. } => {
            RagError::embedding_failure(PROVIDER, kind, format!("{kind}: {message}"))
        }
        other => other,
    }
}

fn first_vector(vectors: Vec<Embedding>) -> Result<Embedding> {
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response"))
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        first_vector(self.embed_batch(&[text]).await?)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        first_vector(self.embed_with_task(&[text], &self.query_task_type).await?)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.embed_with_task(texts, &self.document_task_type).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_input_chars(&self) -> Option<usize> {
        Some(DEFAULT_MAX_EMBED_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify_status(401, ""), GenerationFailure::Unauthorized);
        assert_eq!(
            classify_status(400, r#"{"error":{"details":[{"reason":"API_KEY_INVALID"}]}}"#),
            GenerationFailure::Unauthorized
        );
        assert_eq!(classify_status(400, "bad field"), GenerationFailure::Rejected);
        assert_eq!(classify_status(429, ""), GenerationFailure::RateLimited);
        assert_eq!(classify_status(503, ""), GenerationFailure::Unavailable);
    }

    #[test]
    fn empty_key_is_unauthorized() {
        let err = GeminiGenerator::new(GeminiConfig::new("  ")).unwrap_err();
        assert_eq!(err.generation_failure(), Some(GenerationFailure::Unauthorized));
        let err = GeminiEmbeddingProvider::new(GeminiConfig::new("")).err().unwrap();
        assert!(matches!(err, RagError::Embedding { .. }));
        assert_eq!(err.failure_kind(), Some(GenerationFailure::Unauthorized));
    }

    #[test]
    fn request_uses_camel_case_fields() {
        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: "hi" }] }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn response_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Blue"},{"text":"."}]},
            "finishReason":"STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_text().unwrap(), "Blue.");
    }

    #[test]
    fn blocked_prompt_is_rejected() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = response.into_text().unwrap_err();
        assert_eq!(err.generation_failure(), Some(GenerationFailure::Rejected));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn config_debug_redacts_key() {
        let config = GeminiConfig::new("secret-key");
        assert!(!format!("{config:?}").contains("secret-key"));
        assert_eq!(model_path("gemini-2.5-flash"), "models/gemini-2.5-flash");
        assert_eq!(model_path("models/x"), "models/x");
    }
}
