//! Grounded answer synthesis.
//!
//! The synthesizer turns retrieved passages into a bounded prompt, calls a
//! [`Generator`], and reports exactly which passages the answer was based on.

use tracing::{error, info, warn};

use crate::document::{Answer, RetrievalResult, ScoredUnit};
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// Reply used when retrieval produced no context at all.
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information in the document to answer that question.";

const DEFAULT_INSTRUCTIONS: &str = "Use only the following passages from a document to answer \
the question at the end. If the passages do not contain the answer, say that you don't know; \
do not make up an answer. Refer to passages by their bracketed number.";

/// Answer `query` from `context` with the default prompt.
pub async fn answer(
    query: &str,
    context: &RetrievalResult,
    generator: &dyn Generator,
) -> Result<Answer> {
    AnswerSynthesizer::default().answer(query, context, generator).await
}

/// Builds grounded prompts and collects cited passages.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSynthesizer {
    instructions: String,
}

impl Default for AnswerSynthesizer {
    fn default() -> Self {
        Self { instructions: DEFAULT_INSTRUCTIONS.to_string() }
    }
}

impl AnswerSynthesizer {
    /// Create a synthesizer with the default instructions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the instruction preamble placed before the passages.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Answer `query` using `context`.
    ///
    /// With empty context the generator is not called and the canned
    /// [`INSUFFICIENT_INFORMATION`] reply is returned. Otherwise passages are
    /// included in retrieval order, dropping the lowest-scoring ones until the
    /// prompt fits [`Generator::max_prompt_chars`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Synthesis`] if not even one passage fits the prompt
    /// budget, and propagates [`RagError::Generation`] from the generator.
    pub async fn answer(
        &self,
        query: &str,
        context: &RetrievalResult,
        generator: &dyn Generator,
    ) -> Result<Answer> {
        if context.is_empty() {
            info!("no context retrieved, returning insufficient-information answer");
            return Ok(Answer {
                text: INSUFFICIENT_INFORMATION.to_string(),
                cited_units: Vec::new(),
                grounded: false,
            });
        }

        let budget = generator.max_prompt_chars();
        let fixed = self.render(query, &[]).chars().count();
        if fixed > budget {
            return Err(RagError::Synthesis(format!(
                "the question needs {fixed} characters but the prompt limit is {budget}"
            )));
        }

        let mut included: Vec<&ScoredUnit> = context.iter().collect();
        let mut prompt = self.render(query, &included);
        while prompt.chars().count() > budget {
            let Some(lowest) = lowest_scoring(&included) else {
                break;
            };
            included.remove(lowest);
            prompt = self.render(query, &included);
        }
        if included.is_empty() {
            return Err(RagError::Synthesis(format!(
                "no retrieved passage fits within the prompt limit of {budget} characters"
            )));
        }
        if included.len() < context.len() {
            warn!(
                retrieved = context.len(),
                included = included.len(),
                budget,
                "dropped lowest-scoring passages to fit the prompt"
            );
        }

        let text = generator.generate(&prompt).await.map_err(|e| {
            error!(provider = generator.name(), error = %e, "generation failed");
            e
        })?;

        info!(cited = included.len(), answer_len = text.len(), "answer generated");
        let cited_units = included.into_iter().map(|r| r.unit.clone()).collect();
        Ok(Answer { text, cited_units, grounded: true })
    }

    fn render(&self, query: &str, passages: &[&ScoredUnit]) -> String {
        let mut prompt = String::with_capacity(self.instructions.len() + query.len() + 64);
        prompt.push_str(&self.instructions);
        prompt.push_str("\n\nContext:\n");
        for (i, passage) in passages.iter().enumerate() {
            prompt.push_str(&format!("[{}]", i + 1));
            if let Some(locator) = &passage.unit.source_locator {
                prompt.push_str(&format!(" ({locator})"));
            }
            prompt.push('\n');
            prompt.push_str(&passage.unit.text);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Question: ");
        prompt.push_str(query);
        prompt.push_str("\nAnswer:");
        prompt
    }
}

/// Position of the lowest-scoring passage; among equal scores, the later one.
fn lowest_scoring(passages: &[&ScoredUnit]) -> Option<usize> {
    passages
        .iter()
        .enumerate()
        .min_by(|(i, a), (j, b)| a.score.total_cmp(&b.score).then_with(|| j.cmp(i)))
        .map(|(i, _)| i)
}
