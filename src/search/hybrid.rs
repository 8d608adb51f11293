//! Hybrid ranking: linear blend of semantic and keyword scores.
//!
//! Semantic scores are cosine similarities mapped from [-1, 1] to [0, 1];
//! keyword scores are max-normalized BM25 in [0, 1]. With weight `w`:
//!
//!   final = w * semantic + (1 - w) * keyword
//!
//! - w=1.0: pure cosine ranking
//! - w=0.0: pure BM25 ranking

use std::cmp::Ordering;

/// A blended score for one chunk, addressed by index position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk {
    pub index: usize,
    pub score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
}

/// Cosine similarity; 0.0 for mismatched dimensions or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Semantic score of `embedding` against `query` in [0, 1].
///
/// Chunks whose dimension differs from the query score 0 rather than the
/// neutral 0.5 a zero cosine would map to.
pub fn semantic_score(query: &[f32], embedding: &[f32]) -> f32 {
    if query.len() != embedding.len() || embedding.is_empty() {
        return 0.0;
    }
    ((cosine_similarity(query, embedding) + 1.0) / 2.0).clamp(0.0, 1.0)
}

pub fn blend(semantic: f32, keyword: f32, semantic_weight: f32) -> f32 {
    let w = semantic_weight.clamp(0.0, 1.0);
    w * semantic + (1.0 - w) * keyword
}

/// Blend parallel score slices, drop zero scores, and return the best
/// `limit` in descending order. Equal scores keep index order.
pub fn rank(
    semantic: &[f32],
    keyword: &[f32],
    semantic_weight: f32,
    limit: usize,
) -> Vec<ScoredChunk> {
    let mut results: Vec<ScoredChunk> = semantic
        .iter()
        .zip(keyword)
        .enumerate()
        .map(|(index, (&semantic_score, &keyword_score))| ScoredChunk {
            index,
            score: blend(semantic_score, keyword_score, semantic_weight),
            semantic_score,
            keyword_score,
        })
        .filter(|r| r.score > 0.0)
        .collect();

    // stable: ties stay in insertion order
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_semantic_score_mapping() {
        assert!((semantic_score(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((semantic_score(&[1.0, 0.0], &[0.0, 1.0]) - 0.5).abs() < 1e-6);
        assert!(semantic_score(&[1.0, 0.0], &[-1.0, 0.0]).abs() < 1e-6);
        assert_eq!(semantic_score(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(semantic_score(&[1.0, 0.0], &[]), 0.0);
    }

    #[test]
    fn test_blend_boundaries() {
        assert_eq!(blend(0.8, 0.2, 1.0), 0.8);
        assert_eq!(blend(0.8, 0.2, 0.0), 0.2);
        assert!((blend(0.8, 0.2, 0.5) - 0.5).abs() < 1e-6);
        // out of range weights clamp
        assert_eq!(blend(0.8, 0.2, 3.0), 0.8);
    }

    #[test]
    fn test_rank_filters_zero_and_limits() {
        let semantic = [0.0, 0.0, 0.0, 0.0];
        let keyword = [0.2, 0.0, 1.0, 0.5];
        let ranked = rank(&semantic, &keyword, 0.0, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 2);
        assert_eq!(ranked[1].index, 3);
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let semantic = [0.5, 0.5, 0.5];
        let keyword = [0.0, 0.0, 0.0];
        let ranked = rank(&semantic, &keyword, 1.0, 10);

        let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_rank_weight_selects_signal() {
        let semantic = [0.9, 0.1];
        let keyword = [0.1, 0.9];

        assert_eq!(rank(&semantic, &keyword, 1.0, 10)[0].index, 0);
        assert_eq!(rank(&semantic, &keyword, 0.0, 10)[0].index, 1);
    }
}
