//! Error types for the `docqa-rag` crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a call to a generation capability failed.
///
/// The distinction matters to the caller: a rejected credential needs user
/// action, while an unavailable service only needs another attempt later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailure {
    /// The credential was missing, malformed or rejected.
    Unauthorized,
    /// The provider refused the request because a quota or rate limit was hit.
    RateLimited,
    /// The provider answered with a server-side error.
    Unavailable,
    /// The provider rejected the request itself (bad request, blocked prompt, empty reply).
    Rejected,
    /// The request never completed: connection failure or timeout.
    Transport,
}

impl GenerationFailure {
    /// Whether a single automatic retry is worthwhile.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transport | Self::Unavailable)
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate limited",
            Self::Unavailable => "service unavailable",
            Self::Rejected => "request rejected",
            Self::Transport => "transport failure",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while ingesting a document or answering a question.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document produced no usable text.
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// Failure category when a remote provider call failed.
        kind: Option<GenerationFailure>,
        /// A description of the failure.
        message: String,
    },

    /// Vectors of different dimensions were mixed in one index.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension established by the index.
        expected: usize,
        /// Dimension of the offending vector.
        found: usize,
    },

    /// No answer could be synthesized from the retrieved context.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The generation capability failed.
    #[error("Generation error ({provider}, {kind}): {message}")]
    Generation {
        /// The generation provider that produced the error.
        provider: String,
        /// Failure category.
        kind: GenerationFailure,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query argument was unusable (blank question, `k == 0`).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A question was asked before any document was successfully ingested.
    #[error("No document has been ingested")]
    NoDocument,
}

impl RagError {
    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.to_string(), kind: None, message: message.into() }
    }

    pub(crate) fn embedding_failure(
        provider: &str,
        kind: GenerationFailure,
        message: impl Into<String>,
    ) -> Self {
        Self::Embedding {
            provider: provider.to_string(),
            kind: Some(kind),
            message: message.into(),
        }
    }

    pub(crate) fn generation(
        provider: &str,
        kind: GenerationFailure,
        message: impl Into<String>,
    ) -> Self {
        Self::Generation { provider: provider.to_string(), kind, message: message.into() }
    }

    /// The failure category when this is a generation error.
    pub fn generation_failure(&self) -> Option<GenerationFailure> {
        match self {
            Self::Generation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The failure category of a remote call, whether it was made for
    /// embeddings or for an answer.
    pub fn failure_kind(&self) -> Option<GenerationFailure> {
        match self {
            Self::Generation { kind, .. } => Some(*kind),
            Self::Embedding { kind, .. } => *kind,
            _ => None,
        }
    }

    /// A short message suitable for showing to an end user.
    ///
    /// Provider payloads and other internals stay in the `Display` output and
    /// the logs; this only says what happened and what to do about it.
    pub fn user_message(&self) -> String {
        match self {
            Self::Ingestion(reason) => {
                format!("The document could not be read ({reason}). Upload a different file.")
            }
            Self::Embedding { provider, kind: None, .. } => format!(
                "The {provider} embedding model is unavailable or the text was too large. \
                 Try again or re-ingest with a smaller chunk size."
            ),
            Self::Embedding { provider, kind: Some(kind), .. } => match kind {
                GenerationFailure::Rejected => format!(
                    "{provider} rejected the document text. Re-ingest with a smaller chunk size."
                ),
                _ => provider_failure_message(provider, *kind, "upload the document"),
            },
            Self::DimensionMismatch { .. } => {
                "The document index is inconsistent. Re-ingest the document.".to_string()
            }
            Self::Synthesis(reason) => format!("No answer could be prepared: {reason}."),
            Self::Generation { provider, kind, .. } => match kind {
                GenerationFailure::Rejected => {
                    format!("{provider} declined to answer this question. Try rephrasing it.")
                }
                _ => provider_failure_message(provider, *kind, "ask"),
            },
            Self::Config(reason) => format!("Invalid settings: {reason}."),
            Self::InvalidQuery(reason) => format!("Invalid question: {reason}."),
            Self::NoDocument => "Upload a document before asking questions.".to_string(),
        }
    }
}

/// Message for credential, quota and availability failures; `retry` names
/// the action the user repeats.
fn provider_failure_message(provider: &str, kind: GenerationFailure, retry: &str) -> String {
    match kind {
        GenerationFailure::Unauthorized => {
            format!("{provider} rejected the API key. Check the credential and try again.")
        }
        GenerationFailure::RateLimited => {
            format!("{provider} quota or rate limit reached. Wait a moment and {retry} again.")
        }
        GenerationFailure::Unavailable | GenerationFailure::Transport => {
            format!("{provider} is currently unreachable. Try again shortly.")
        }
        GenerationFailure::Rejected => format!("{provider} rejected the request."),
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_failures_keep_their_kind_in_user_message() {
        let err = RagError::embedding_failure("Gemini", GenerationFailure::Unauthorized, "400");
        assert_eq!(err.failure_kind(), Some(GenerationFailure::Unauthorized));
        assert_eq!(err.generation_failure(), None);
        assert!(err.user_message().contains("API key"));

        let err = RagError::embedding_failure("Gemini", GenerationFailure::RateLimited, "429");
        assert!(err.user_message().contains("upload the document again"));

        let err = RagError::embedding_failure("Gemini", GenerationFailure::Unavailable, "503");
        assert!(err.user_message().contains("unreachable"));
    }

    #[test]
    fn local_embedding_failure_suggests_smaller_chunks() {
        let err = RagError::embedding("Local", "input too long");
        assert_eq!(err.failure_kind(), None);
        assert!(err.user_message().contains("smaller chunk size"));
    }

    #[test]
    fn generation_messages_distinguish_credential_from_outage() {
        let bad_key = RagError::generation("Gemini", GenerationFailure::Unauthorized, "401");
        let outage = RagError::generation("Gemini", GenerationFailure::Transport, "timeout");
        assert!(bad_key.user_message().contains("API key"));
        assert!(outage.user_message().contains("unreachable"));
        assert_ne!(bad_key.user_message(), outage.user_message());
    }
}
