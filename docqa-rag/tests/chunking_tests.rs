//! Property tests for text splitting.

use docqa_rag::{Chunker, DocumentText, FixedSizeChunker, RecursiveChunker, TextUnit, split};
use proptest::prelude::*;

/// Rebuild the source text from units using their declared offsets.
fn reconstruct(units: &[TextUnit]) -> String {
    let mut out = String::new();
    let mut covered = 0;
    for unit in units {
        let skip = covered - unit.char_offset;
        out.extend(unit.text.chars().skip(skip));
        covered = unit.char_end();
    }
    out
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zé语 .!?\n]{0,400}"
}

fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

/// *For any* text and valid sizes, the units cover the text exactly once apart
/// from the overlap, never exceed `chunk_size`, and never share more than
/// `chunk_overlap` characters with their predecessor.
mod prop_split_invariants {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn recursive_units_reconstruct_text(text in arb_text(), (size, overlap) in arb_sizes()) {
            let units = split(&DocumentText::new(text.clone()), size, overlap).unwrap();
            check_units(&text, &units, size, overlap)?;
        }

        #[test]
        fn fixed_units_reconstruct_text(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let units = chunker.split(&DocumentText::new(text.clone()));
            check_units(&text, &units, size, overlap)?;
        }

        #[test]
        fn short_text_is_one_unit(text in "[a-z ]{1,40}") {
            let units = split(&DocumentText::new(text.clone()), 40, 10).unwrap();
            prop_assert_eq!(units.len(), 1);
            prop_assert_eq!(&units[0].text, &text);
        }
    }

    fn check_units(
        text: &str,
        units: &[TextUnit],
        size: usize,
        overlap: usize,
    ) -> Result<(), TestCaseError> {
        if text.is_empty() {
            prop_assert!(units.is_empty());
            return Ok(());
        }
        prop_assert_eq!(reconstruct(units), text);
        prop_assert_eq!(units[0].char_offset, 0);
        prop_assert_eq!(units.last().unwrap().char_end(), text.chars().count());

        for (i, unit) in units.iter().enumerate() {
            prop_assert!(unit.char_len() >= 1);
            prop_assert!(unit.char_len() <= size);
            prop_assert_eq!(unit.sequence_index, i);
            prop_assert_eq!(unit.id, i as u64);
        }
        for pair in units.windows(2) {
            prop_assert!(pair[1].char_offset > pair[0].char_offset);
            prop_assert!(pair[1].char_offset <= pair[0].char_end());
            prop_assert!(pair[0].char_end() - pair[1].char_offset <= overlap);
        }
        Ok(())
    }
}

#[test]
fn empty_text_yields_no_units() {
    assert!(split(&DocumentText::new(""), 10, 2).unwrap().is_empty());
}

#[test]
fn invalid_sizes_are_config_errors() {
    let doc = DocumentText::new("some text");
    assert!(matches!(split(&doc, 0, 0), Err(docqa_rag::RagError::Config(_))));
    assert!(matches!(split(&doc, 5, 5), Err(docqa_rag::RagError::Config(_))));
}

#[test]
fn units_inherit_the_page_they_start_in() {
    let doc = DocumentText::from_pages([
        "The first page talks about the sky.",
        "The second page is about grass.",
    ]);
    let units = RecursiveChunker::new(20, 4).unwrap().split(&doc);

    assert_eq!(units[0].source_locator.as_deref(), Some("page 1"));
    assert_eq!(units.last().unwrap().source_locator.as_deref(), Some("page 2"));
    for unit in &units {
        assert_eq!(unit.source_locator.as_deref(), doc.locator_at(unit.char_offset));
    }
}

#[test]
fn prefers_sentence_ends_over_mid_word_cuts() {
    let text = "Rust has ownership. Borrowing follows rules. Lifetimes track scopes.";
    let units = RecursiveChunker::new(30, 0).unwrap().split(&DocumentText::new(text));
    assert_eq!(units[0].text, "Rust has ownership. ");
    assert_eq!(reconstruct(&units), text);
}

#[test]
fn default_sizes_keep_a_paragraph_together() {
    let para = "word ".repeat(150);
    let text = format!("{}\n\n{}", para.trim_end(), para.trim_end());
    let units = split(&DocumentText::new(text.clone()), 1000, 200).unwrap();
    assert_eq!(units.len(), 2);
    assert!(units[0].text.ends_with("\n\n"));
    assert_eq!(reconstruct(&units), text);
}
