//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`] - bounded windows that prefer to end on a paragraph,
//!   then a sentence, then a word boundary
//! - [`FixedSizeChunker`] - bounded windows with hard cuts
//!
//! Both walk the text by characters, never by bytes, so multi-byte text is
//! never split inside a code point. Consecutive units share at most
//! `chunk_overlap` characters and no character of the source is skipped.

use crate::config::RagConfig;
use crate::document::{DocumentText, TextUnit};
use crate::error::{RagError, Result};

/// A strategy for splitting extracted text into retrievable units.
pub trait Chunker: Send + Sync {
    /// Split a document into units.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn split(&self, document: &DocumentText) -> Vec<TextUnit>;
}

/// Split `document` with the default boundary-preferring strategy.
///
/// # Errors
///
/// Returns [`RagError::Config`] if `chunk_size == 0` or `overlap >= chunk_size`.
pub fn split(document: &DocumentText, chunk_size: usize, overlap: usize) -> Result<Vec<TextUnit>> {
    Ok(RecursiveChunker::new(chunk_size, overlap)?.split(document))
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Config(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits text into windows of at most `chunk_size` characters, cutting at the
/// nearest paragraph, sentence or word boundary inside a lookback window.
///
/// When no boundary is found the window is cut hard at `chunk_size`. The next
/// window starts `chunk_overlap` characters before the cut, moved forward to
/// the first word start inside that overlap when there is one.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Chunker, DocumentText, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1000, 200)?;
/// let units = chunker.split(&DocumentText::new(text));
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    lookback: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per unit
    /// * `chunk_overlap` - maximum number of characters shared by consecutive units
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, lookback: (chunk_size - chunk_overlap) / 2 })
    }

    /// Create a chunker from validated pipeline settings.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let chunker = Self::new(config.chunk_size, config.chunk_overlap)?;
        Ok(match config.boundary_lookback {
            Some(lookback) => chunker.with_lookback(lookback),
            None => chunker,
        })
    }

    /// Set how many characters before the hard cutoff may be searched for a boundary.
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, document: &DocumentText) -> Vec<TextUnit> {
        Walk {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
            lookback: self.lookback,
            align_starts: true,
        }
        .run(document)
    }
}

/// Splits text into fixed-size windows by character count with hard cuts.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let units = chunker.split(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn split(&self, document: &DocumentText) -> Vec<TextUnit> {
        Walk {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
            lookback: 0,
            align_starts: false,
        }
        .run(document)
    }
}

/// One left-to-right pass over a document's characters.
struct Walk {
    chunk_size: usize,
    overlap: usize,
    lookback: usize,
    align_starts: bool,
}

impl Walk {
    fn run(&self, document: &DocumentText) -> Vec<TextUnit> {
        let text = document.text();
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        byte_offsets.push(text.len());
        let len = chars.len();

        let mut units = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + self.chunk_size).min(len);
            let end = if hard_end == len || self.lookback == 0 {
                hard_end
            } else {
                // Never cut so early that the next start would fail to advance.
                let floor = (start + self.overlap + 1).max(hard_end.saturating_sub(self.lookback));
                find_boundary(&chars, floor, hard_end).unwrap_or(hard_end)
            };

            let sequence_index = units.len();
            units.push(TextUnit {
                id: sequence_index as u64,
                text: text[byte_offsets[start]..byte_offsets[end]].to_string(),
                source_locator: document.locator_at(start).map(str::to_string),
                sequence_index,
                char_offset: start,
            });

            if end == len {
                break;
            }
            start = self.next_start(&chars, end);
        }

        units
    }

    fn next_start(&self, chars: &[char], end: usize) -> usize {
        let earliest = end - self.overlap;
        if !self.align_starts {
            return earliest;
        }
        (earliest..=end)
            .find(|&p| p > 0 && chars[p - 1].is_whitespace() && !chars[p].is_whitespace())
            .unwrap_or(earliest)
    }
}

/// Find the latest cut position in `floor..=hard_end`, preferring a paragraph
/// break, then the end of a sentence, then any whitespace.
///
/// A cut position `c` means the unit ends just before `chars[c]`.
fn find_boundary(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    let candidates = || (floor.max(1)..=hard_end).rev();

    let is_paragraph = |c: usize| c >= 2 && chars[c - 2] == '\n' && chars[c - 1] == '\n';
    let is_sentence = |c: usize| {
        c >= 2
            && chars[c - 1].is_whitespace()
            && matches!(chars[c - 2], '.' | '!' | '?' | '。' | '！' | '？')
    };
    let is_word = |c: usize| chars[c - 1].is_whitespace();

    candidates()
        .find(|&c| is_paragraph(c))
        .or_else(|| candidates().find(|&c| is_sentence(c)))
        .or_else(|| candidates().find(|&c| is_word(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn paragraph_beats_later_sentence_and_word() {
        let c = chars("aaaa\n\nbbb. ccc dd");
        assert_eq!(find_boundary(&c, 1, c.len() - 1), Some(6));
    }

    #[test]
    fn sentence_beats_later_word() {
        let c = chars("one two. three four");
        assert_eq!(find_boundary(&c, 1, 18), Some(9));
    }

    #[test]
    fn no_boundary_in_window() {
        let c = chars("abcdefghij klm");
        assert_eq!(find_boundary(&c, 2, 9), None);
    }

    #[test]
    fn fixed_size_cuts_hard_with_exact_overlap() {
        let chunker = FixedSizeChunker::new(4, 1).unwrap();
        let units = chunker.split(&DocumentText::new("abcdefghij"));
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, ["abcd", "defg", "ghij"]);
        assert_eq!(units[2].char_offset, 6);
    }

    #[test]
    fn recursive_prefers_word_boundaries() {
        let chunker = RecursiveChunker::new(12, 0).unwrap();
        let units = chunker.split(&DocumentText::new("alpha beta gamma delta"));
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, ["alpha beta ", "gamma delta"]);
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        assert!(RecursiveChunker::new(0, 0).is_err());
        assert!(RecursiveChunker::new(10, 10).is_err());
        assert!(FixedSizeChunker::new(10, 11).is_err());
    }
}
