//! Text extraction from uploaded document bytes.
//!
//! Plain text and Markdown are decoded as strict UTF-8. PDF support needs the
//! `pdf` feature. In every format a form feed (`\x0C`) marks a page break, and
//! each page becomes a `page N` section of the resulting [`DocumentText`].

use std::path::Path;

use tracing::debug;

use crate::document::DocumentText;
use crate::error::{RagError, Result};

/// Media type for plain text.
pub const TEXT_PLAIN: &str = "text/plain";
/// Media type for Markdown.
pub const TEXT_MARKDOWN: &str = "text/markdown";
/// Media type for PDF.
pub const APPLICATION_PDF: &str = "application/pdf";

const PAGE_BREAK: char = '\x0C';

/// Guess the media type from a file extension.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "text" => Some(TEXT_PLAIN),
        "md" | "markdown" => Some(TEXT_MARKDOWN),
        "pdf" => Some(APPLICATION_PDF),
        _ => None,
    }
}

/// Extract text from `bytes` of the declared `media_type`.
///
/// Media type parameters such as `; charset=utf-8` are ignored.
///
/// # Errors
///
/// Returns [`RagError::Ingestion`] for empty input, unsupported media types,
/// undecodable content, or documents with no visible text.
pub async fn extract_text(bytes: &[u8], media_type: &str) -> Result<DocumentText> {
    if bytes.is_empty() {
        return Err(RagError::Ingestion("document is empty".to_string()));
    }

    let essence = media_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let raw = match essence.as_str() {
        TEXT_PLAIN | TEXT_MARKDOWN | "text/x-markdown" => decode_utf8(bytes)?,
        APPLICATION_PDF => extract_pdf(bytes).await?,
        other => {
            return Err(RagError::Ingestion(format!("unsupported media type '{other}'")));
        }
    };

    let document = paginate(&raw);
    if document.is_blank() {
        return Err(RagError::Ingestion("document contains no text".to_string()));
    }

    debug!(media_type = %essence, pages = document.sections().len(), "extracted document text");
    Ok(document)
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RagError::Ingestion(format!("document is not valid UTF-8: {e}")))?;
    Ok(text.strip_prefix('\u{FEFF}').unwrap_or(text).to_string())
}

fn paginate(raw: &str) -> DocumentText {
    if raw.contains(PAGE_BREAK) {
        DocumentText::from_pages(raw.split(PAGE_BREAK))
    } else {
        DocumentText::new(raw)
    }
}

#[cfg(feature = "pdf")]
async fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.to_vec();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| RagError::Ingestion(format!("PDF extraction task failed: {e}")))?
        .map_err(|e| RagError::Ingestion(format!("PDF could not be read: {e}")))?;
    // Single-page output carries no form feed; add one so the page is still labelled.
    if text.contains(PAGE_BREAK) { Ok(text) } else { Ok(format!("{text}{PAGE_BREAK}")) }
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf(_bytes: &[u8]) -> Result<String> {
    Err(RagError::Ingestion("PDF support is not enabled in this build (feature `pdf`)".to_string()))
}
