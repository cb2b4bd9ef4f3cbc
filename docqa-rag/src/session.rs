//! Per-user session context: one document, one cached index.

use std::sync::Arc;

use tracing::{info, warn};

use crate::document::{Answer, DocumentText};
use crate::error::{RagError, Result};
use crate::index::IndexHandle;
use crate::loader::extract_text;
use crate::pipeline::RagPipeline;

/// The session-scoped state of a question-answering conversation.
///
/// Holds the index built from the most recent successful ingest so that it
/// is built once and queried many times. A failed ingest clears the index, so
/// questions are never answered from a previous document by accident.
pub struct DocumentSession {
    pipeline: Arc<RagPipeline>,
    index: Option<IndexHandle>,
}

impl DocumentSession {
    /// Start a session with no document.
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline, index: None }
    }

    /// The pipeline this session runs on.
    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// The current index, if a document has been ingested.
    pub fn index(&self) -> Option<&IndexHandle> {
        self.index.as_ref()
    }

    /// `true` once a document has been ingested successfully.
    pub fn has_document(&self) -> bool {
        self.index.is_some()
    }

    /// Forget the current document.
    pub fn clear(&mut self) {
        self.index = None;
    }

    /// Ingest already-extracted text, replacing any previous document.
    pub async fn ingest(&mut self, document: &DocumentText) -> Result<IndexHandle> {
        self.index = None;
        let index = self.pipeline.ingest(document).await?;
        self.index = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Extract text from uploaded bytes and ingest it.
    pub async fn ingest_bytes(&mut self, bytes: &[u8], media_type: &str) -> Result<IndexHandle> {
        self.index = None;
        let document = extract_text(bytes, media_type).await.inspect_err(|e| {
            warn!(media_type, error = %e, "text extraction failed");
        })?;
        let index = self.ingest(&document).await?;
        info!(media_type, unit_count = index.len(), "document ready");
        Ok(index)
    }

    /// Answer a question about the current document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoDocument`] if nothing has been ingested, and
    /// otherwise whatever [`RagPipeline::ask`] returns.
    pub async fn ask(&self, query: &str) -> Result<Answer> {
        let index = self.index.as_ref().ok_or(RagError::NoDocument)?;
        self.pipeline.ask(query, index).await
    }
}
