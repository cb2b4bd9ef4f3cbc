//! Data types for extracted text, retrievable units, search results and answers.

use serde::{Deserialize, Serialize};

/// A fixed-dimension embedding vector.
pub type Embedding = Vec<f32>;

/// The start of a page or section inside a [`DocumentText`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    /// Offset of the first character of the section, counted in characters.
    pub char_offset: usize,
    /// Human-readable locator, e.g. `page 3`.
    pub locator: String,
}

/// Text extracted from one document, plus where its pages begin.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentText {
    text: String,
    sections: Vec<Section>,
}

impl DocumentText {
    /// Separator inserted between pages by [`DocumentText::from_pages`].
    pub const PAGE_SEPARATOR: &'static str = "\n\n";

    /// Wrap plain text that carries no page information.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), sections: Vec::new() }
    }

    /// Wrap text together with explicit section starts.
    ///
    /// Sections are sorted by offset; offsets past the end of the text are kept
    /// but can never be selected.
    pub fn with_sections(text: impl Into<String>, mut sections: Vec<Section>) -> Self {
        sections.sort_by_key(|section| section.char_offset);
        Self { text: text.into(), sections }
    }

    /// Join pages into one text, labelling each with `page N` (1-based).
    ///
    /// Pages with no visible content are skipped but still consume a page number.
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        let mut char_len = 0;
        let mut sections = Vec::new();

        for (index, page) in pages.into_iter().enumerate() {
            let page = page.as_ref();
            if page.trim().is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push_str(Self::PAGE_SEPARATOR);
                char_len += Self::PAGE_SEPARATOR.chars().count();
            }
            let locator = format!("page {}", index + 1);
            sections.push(Section { char_offset: char_len, locator });
            text.push_str(page);
            char_len += page.chars().count();
        }

        Self { text, sections }
    }

    /// The full extracted text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Section starts in ascending offset order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// `true` if the text has no non-whitespace characters.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Locator of the section containing the character at `char_offset`.
    pub fn locator_at(&self, char_offset: usize) -> Option<&str> {
        let idx = self.sections.partition_point(|section| section.char_offset <= char_offset);
        idx.checked_sub(1).map(|i| self.sections[i].locator.as_str())
    }
}

/// A bounded, contiguous span of a document: the atomic unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextUnit {
    /// Unique identifier within the document.
    pub id: u64,
    /// The text content of the unit.
    pub text: String,
    /// Page or section the unit starts in, if the document had any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_locator: Option<String>,
    /// Position of the unit in document order.
    pub sequence_index: usize,
    /// Character offset of the unit's first character in the document text.
    pub char_offset: usize,
}

impl TextUnit {
    /// Number of characters in the unit.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Character offset one past the unit's last character.
    pub fn char_end(&self) -> usize {
        self.char_offset + self.char_len()
    }
}

/// A [`TextUnit`] paired with its embedding, as stored by the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed unit.
    pub unit: TextUnit,
    /// The unit's embedding.
    pub vector: Embedding,
}

/// A retrieved [`TextUnit`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredUnit {
    /// The retrieved unit.
    pub unit: TextUnit,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// Units returned by a search, ordered by descending similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RetrievalResult(Vec<ScoredUnit>);

impl RetrievalResult {
    /// Wrap already-ordered results.
    pub fn new(results: Vec<ScoredUnit>) -> Self {
        Self(results)
    }

    /// A result with no units.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the results in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredUnit> {
        self.0.iter()
    }

    /// The results as a slice.
    pub fn as_slice(&self) -> &[ScoredUnit] {
        &self.0
    }

    /// The highest-ranked result.
    pub fn top(&self) -> Option<&ScoredUnit> {
        self.0.first()
    }

    /// Keep only results satisfying `keep`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&ScoredUnit) -> bool) {
        self.0.retain(keep);
    }

    /// Unwrap into the underlying vector.
    pub fn into_inner(self) -> Vec<ScoredUnit> {
        self.0
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredUnit;
    type IntoIter = std::vec::IntoIter<ScoredUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredUnit;
    type IntoIter = std::slice::Iter<'a, ScoredUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A generated answer and the passages it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The answer text.
    pub text: String,
    /// Units included in the prompt, in retrieval order.
    pub cited_units: Vec<TextUnit>,
    /// `false` when no context was available and the canned reply was returned.
    pub grounded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pages_records_page_offsets() {
        let doc = DocumentText::from_pages(["Alpha", "", "Gamma"]);
        assert_eq!(doc.text(), "Alpha\n\nGamma");
        assert_eq!(doc.sections().len(), 2);
        assert_eq!(doc.locator_at(0), Some("page 1"));
        assert_eq!(doc.locator_at(4), Some("page 1"));
        assert_eq!(doc.locator_at(7), Some("page 3"));
    }

    #[test]
    fn plain_text_has_no_locator() {
        let doc = DocumentText::new("no pages here");
        assert_eq!(doc.locator_at(3), None);
        assert!(!doc.is_blank());
        assert!(DocumentText::new(" \n\t").is_blank());
    }

    #[test]
    fn page_offsets_count_characters_not_bytes() {
        let doc = DocumentText::from_pages(["héllo", "wörld"]);
        assert_eq!(doc.sections()[1].char_offset, 7);
        assert_eq!(doc.locator_at(7), Some("page 2"));
    }
}
