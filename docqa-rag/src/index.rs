//! In-memory vector index using cosine similarity.
//!
//! [`VectorIndex`] is built once from a batch of [`IndexEntry`] values and is
//! immutable afterwards, so a shared `Arc<VectorIndex>` can serve concurrent
//! queries without locking. Vectors are L2-normalised at build time and the
//! query vector at query time; the score is then a plain dot product.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::document::{Embedding, IndexEntry, RetrievalResult, ScoredUnit, TextUnit};
use crate::error::{RagError, Result};

/// Shared handle to a built index, owned by the caller's session.
pub type IndexHandle = Arc<VectorIndex>;

/// Scale `vector` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug)]
struct Stored {
    unit: TextUnit,
    vector: Embedding,
}

/// An immutable, exhaustive-search vector index over one document's units.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::VectorIndex;
///
/// let index = VectorIndex::build(entries)?;
/// let top = index.query(&query_vector, 4)?;
/// ```
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<Stored>,
    dimensions: Option<usize>,
}

impl VectorIndex {
    /// Build an index from `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the entries do not all share
    /// one dimension, or if that dimension is zero.
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Ok(Self::default());
        };
        let dimensions = first.vector.len();
        if dimensions == 0 {
            return Err(RagError::DimensionMismatch { expected: 1, found: 0 });
        }

        let mut stored = Vec::with_capacity(entries.len());
        for IndexEntry { unit, mut vector } in entries {
            if vector.len() != dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: dimensions,
                    found: vector.len(),
                });
            }
            l2_normalize(&mut vector);
            stored.push(Stored { unit, vector });
        }

        debug!(entry_count = stored.len(), dimensions, "built vector index");
        Ok(Self { entries: stored, dimensions: Some(dimensions) })
    }

    /// An index with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of indexed units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by every stored vector, `None` for an empty index.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Indexed units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &TextUnit> {
        self.entries.iter().map(|entry| &entry.unit)
    }

    /// Return the `k` units most similar to `vector`.
    ///
    /// The result has exactly `min(k, len())` items ordered by descending
    /// cosine similarity; equal scores are ordered by ascending
    /// `sequence_index`, then `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidQuery`] if `k == 0` and
    /// [`RagError::DimensionMismatch`] if a non-empty index receives a vector
    /// of another dimension.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidQuery("k must be greater than zero".to_string()));
        }
        let Some(dimensions) = self.dimensions else {
            return Ok(RetrievalResult::empty());
        };
        if vector.len() != dimensions {
            return Err(RagError::DimensionMismatch { expected: dimensions, found: vector.len() });
        }

        let mut query = vector.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(f32, &Stored)> = self
            .entries
            .iter()
            .map(|entry| {
                let score: f32 = entry.vector.iter().zip(&query).map(|(x, y)| x * y).sum();
                (score, entry)
            })
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            rank_order(*score_a, &a.unit, *score_b, &b.unit)
        });
        scored.truncate(k);

        Ok(RetrievalResult::new(
            scored
                .into_iter()
                .map(|(score, entry)| ScoredUnit { unit: entry.unit.clone(), score })
                .collect(),
        ))
    }
}

/// Descending score, then ascending `sequence_index`, then ascending `id`.
fn rank_order(score_a: f32, a: &TextUnit, score_b: f32, b: &TextUnit) -> Ordering {
    score_b
        .total_cmp(&score_a)
        .then_with(|| a.sequence_index.cmp(&b.sequence_index))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: u64) -> TextUnit {
        TextUnit {
            id,
            text: format!("unit {id}"),
            source_locator: None,
            sequence_index: id as usize,
            char_offset: 0,
        }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn scores_are_scale_invariant() {
        let index = VectorIndex::build(vec![
            IndexEntry { unit: unit(0), vector: vec![10.0, 0.0] },
            IndexEntry { unit: unit(1), vector: vec![0.0, 0.5] },
        ])
        .unwrap();
        let result = index.query(&[3.0, 0.1], 2).unwrap();
        assert_eq!(result.top().unwrap().unit.id, 0);
        assert!(result.top().unwrap().score <= 1.0 + 1e-6);
    }

    #[test]
    fn rejects_zero_k() {
        let index = VectorIndex::empty();
        assert!(matches!(index.query(&[1.0], 0), Err(RagError::InvalidQuery(_))));
    }

    #[test]
    fn rejects_zero_dimension_entries() {
        let entries = vec![IndexEntry { unit: unit(0), vector: Vec::new() }];
        let err = VectorIndex::build(entries).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { found: 0, .. }));
    }
}
