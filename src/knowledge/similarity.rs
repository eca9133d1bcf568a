//! Cosine similarity and candidate ranking.

use std::cmp::Ordering;

use thiserror::Error;
use tracing::warn;

use super::types::{KnowledgeEntry, ScoredEntry};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimilarityError {
    #[error("cannot compare empty vectors")]
    EmptyVector,

    #[error("cannot compare zero-norm vectors")]
    ZeroNorm,

    #[error("vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// `dot(a, b) / (|a| * |b|)`, clamped to `[-1, 1]`.
///
/// Fails instead of returning a sentinel score for inputs where the ratio is undefined.
///
/// ```
/// use lumen::knowledge::cosine_similarity;
///
/// let s = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
/// assert!((s - 1.0).abs() < 1e-6);
/// assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_err());
/// ```
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.is_empty() || b.is_empty() {
        return Err(SimilarityError::EmptyVector);
    }
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (dot, norm_a_sq, norm_b_sq) =
        a.iter()
            .zip(b.iter())
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (&av, &bv)| {
                (dot + av * bv, na + av * av, nb + bv * bv)
            });

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 || !norm_a.is_finite() || !norm_b.is_finite() {
        return Err(SimilarityError::ZeroNorm);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Scores `candidates` against `query`, keeps those at or above `threshold` and
/// returns at most `limit`, best first.
///
/// Ties keep candidate order, so higher-confidence entries win equal scores.
/// Candidates that cannot be scored are dropped with a warning; an unusable
/// query fails the whole ranking.
pub fn rank_candidates(
    query: &[f32],
    candidates: Vec<KnowledgeEntry>,
    threshold: f32,
    limit: usize,
) -> Result<Vec<ScoredEntry>, SimilarityError> {
    if query.is_empty() {
        return Err(SimilarityError::EmptyVector);
    }
    if query.iter().all(|v| *v == 0.0) {
        return Err(SimilarityError::ZeroNorm);
    }

    let mut scored: Vec<ScoredEntry> = candidates
        .into_iter()
        .filter_map(|entry| match cosine_similarity(query, &entry.embedding) {
            Ok(similarity) => Some(ScoredEntry { entry, similarity }),
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "Dropping candidate: cannot score embedding");
                None
            }
        })
        .filter(|s| s.similarity >= threshold)
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(limit);

    Ok(scored)
}
