//! Settings file loading and command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use docqa_rag::RagConfig;
use serde::{Deserialize, Serialize};

use crate::cli::{AskArgs, ChunkingArgs};

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Gemini settings as they appear in the settings file.
///
/// Kept separate from the library's `GeminiConfig` so the file format does
/// not depend on which features the binary was built with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiSettings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub base_url: Option<String>,
    pub max_prompt_chars: Option<usize>,
    pub max_retries: Option<u32>,
}

/// Contents of the optional JSON settings file.
///
/// ```json
/// { "rag": { "chunk_size": 800, "top_k": 6 }, "gemini": { "model": "gemini-2.5-pro" } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub rag: RagConfig,
    pub gemini: GeminiSettings,
}

impl Settings {
    /// Read settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Apply chunking flags and validate the result.
    pub fn apply_chunking(&mut self, args: &ChunkingArgs) -> Result<()> {
        if let Some(size) = args.chunk_size {
            self.rag.chunk_size = size;
        }
        if let Some(overlap) = args.chunk_overlap {
            self.rag.chunk_overlap = overlap;
        }
        self.rag.validate()?;
        Ok(())
    }

    /// Apply every `ask` flag and validate the result.
    pub fn apply_ask(&mut self, args: &AskArgs) -> Result<()> {
        if let Some(top_k) = args.top_k {
            self.rag.top_k = top_k;
        }
        if let Some(model) = &args.model {
            self.gemini.model = Some(model.clone());
        }
        if let Some(key) = &args.api_key {
            self.gemini.api_key = Some(key.clone());
        }
        self.apply_chunking(&args.chunking)
    }

    /// API key from flags or the settings file, falling back to `GOOGLE_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.gemini
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw = r#"{ "rag": { "chunk_size": 800 }, "gemini": { "model": "gemini-2.5-pro" } }"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.rag.chunk_size, 800);
        assert_eq!(settings.rag.chunk_overlap, 200);
        assert_eq!(settings.rag.top_k, 4);
        assert_eq!(settings.gemini.model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn flags_override_file_and_are_validated() {
        let mut settings = Settings::default();
        let args = ChunkingArgs { chunk_size: Some(300), chunk_overlap: Some(50) };
        settings.apply_chunking(&args).unwrap();
        assert_eq!((settings.rag.chunk_size, settings.rag.chunk_overlap), (300, 50));

        let args = ChunkingArgs { chunk_size: Some(40), chunk_overlap: None };
        let err = settings.apply_chunking(&args).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/docqa.json"))).is_err());
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
