//! Output formatting for answers and chunk listings.

use docqa_rag::{Answer, RagError, TextUnit};
use serde::Serialize;

/// Characters of each cited passage shown to the user.
pub const EXCERPT_CHARS: usize = 300;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Render `result` in the requested mode.
pub fn render<T: CommandOutput>(result: &T, json_mode: bool) -> String {
    if json_mode { result.to_json() } else { result.to_human() }
}

/// First `max_chars` characters of `s`, with `...` appended when cut.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct Source {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub char_offset: usize,
    pub excerpt: String,
}

impl Source {
    fn from_unit(unit: &TextUnit) -> Self {
        Self {
            id: unit.id,
            locator: unit.source_locator.clone(),
            char_offset: unit.char_offset,
            excerpt: excerpt(unit.text.trim(), EXCERPT_CHARS),
        }
    }
}

/// One answered (or failed) question.
#[derive(Debug, Serialize)]
pub struct AnswerOutput {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounded: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerOutput {
    pub fn answered(question: &str, answer: &Answer) -> Self {
        Self {
            question: question.to_string(),
            answer: Some(answer.text.trim().to_string()),
            grounded: Some(answer.grounded),
            sources: answer.cited_units.iter().map(Source::from_unit).collect(),
            error: None,
        }
    }

    pub fn failed(question: &str, error: &RagError) -> Self {
        Self {
            question: question.to_string(),
            answer: None,
            grounded: None,
            sources: Vec::new(),
            error: Some(error.user_message()),
        }
    }
}

impl CommandOutput for AnswerOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Q: {}\n", self.question);
        if let Some(error) = &self.error {
            out.push_str(&format!("Error: {error}\n"));
            return out;
        }
        out.push_str(&format!("A: {}\n", self.answer.as_deref().unwrap_or_default()));
        if !self.sources.is_empty() {
            out.push_str("\nSources:\n");
            for (i, source) in self.sources.iter().enumerate() {
                let label = source.locator.as_deref().unwrap_or("document");
                let excerpt = source.excerpt.replace('\n', " ");
                out.push_str(&format!("  [{}] {label}: {excerpt}\n", i + 1));
            }
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct ChunkOutput {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub char_offset: usize,
    pub char_len: usize,
    pub text: String,
}

/// Every unit of one document.
#[derive(Debug, Serialize)]
pub struct ChunksOutput {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub units: Vec<ChunkOutput>,
}

impl ChunksOutput {
    pub fn new(chunk_size: usize, chunk_overlap: usize, units: &[TextUnit]) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            units: units
                .iter()
                .map(|u| ChunkOutput {
                    id: u.id,
                    locator: u.source_locator.clone(),
                    char_offset: u.char_offset,
                    char_len: u.char_len(),
                    text: u.text.clone(),
                })
                .collect(),
        }
    }
}

impl CommandOutput for ChunksOutput {
    fn to_human(&self) -> String {
        let mut out = format!(
            "{} units (chunk_size {}, chunk_overlap {})\n",
            self.units.len(),
            self.chunk_size,
            self.chunk_overlap
        );
        for unit in &self.units {
            let locator = unit.locator.as_deref().map(|l| format!(" [{l}]")).unwrap_or_default();
            out.push_str(&format!(
                "\n#{}{locator} offset {}, {} chars\n{}\n",
                unit.id,
                unit.char_offset,
                unit.char_len,
                excerpt(&unit.text, EXCERPT_CHARS)
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
        assert_eq!(excerpt("short", 300), "short");
    }
}
