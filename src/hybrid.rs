// SPDX-License-Identifier: MIT OR Apache-2.0

//! Score normalization and fusion for hybrid search.
//!
//! Semantic scores are already in `[0, 1]` (`1 / (1 + distance)`). BM25
//! scores are unbounded, so each keyword batch is divided by its own
//! maximum before the two are blended:
//!
//! ```text
//! combined = alpha * semantic + (1 - alpha) * keyword
//! ```
//!
//! A chunk found by only one retriever scores 0 in the other.

use anyhow::Result;
use std::collections::HashMap;

use crate::errors::InvalidAlphaError;
use crate::query::keyword::KeywordHit;
use crate::query::search::SearchResult;

/// Default weight of the semantic score.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Upper bound on candidates fetched per retriever without re-ranking.
pub const MAX_FETCH_K: usize = 100;

/// Rejects fusion weights outside `[0, 1]` (including NaN).
pub fn validate_alpha(alpha: f32) -> Result<()> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(InvalidAlphaError(alpha).into())
    }
}

/// Candidates fetched from each retriever before fusion.
pub fn fetch_k(top_k: usize, rerank: bool, rerank_top_k: usize) -> usize {
    if rerank {
        rerank_top_k
    } else {
        top_k.saturating_mul(3).min(MAX_FETCH_K)
    }
}

/// Converts a squared L2 distance to a similarity in `(0, 1]`.
pub fn distance_to_score(distance: f32) -> f32 {
    if distance.is_finite() {
        1.0 / (1.0 + distance.max(0.0))
    } else {
        0.0
    }
}

/// Divides every score by the batch maximum.
///
/// A batch whose maximum is not positive normalizes to all zeros.
pub fn normalize_keyword_scores(scores: &[f32]) -> Vec<f32> {
    let max_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max_score <= 0.0 || !max_score.is_finite() {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s / max_score).clamp(0.0, 1.0)).collect()
}

/// Maps a batch onto `[0, 1]` by its min and max.
///
/// When every score is equal the range is taken as 1.0, so the batch maps to
/// zeros rather than dividing by zero. Non-finite scores count as the batch
/// minimum.
pub fn normalize_min_max(scores: &[f32]) -> Vec<f32> {
    let finite = scores.iter().copied().filter(|s| s.is_finite());
    let min = finite.clone().fold(f32::INFINITY, f32::min);
    let max = finite.fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() {
        return vec![0.0; scores.len()];
    }
    let range = if max - min > 0.0 { max - min } else { 1.0 };

    scores
        .iter()
        .map(|&s| if s.is_finite() { s } else { min })
        .map(|s| ((s - min) / range).clamp(0.0, 1.0))
        .collect()
}

/// Weighted blend of the two sub-scores.
pub fn fuse(alpha: f32, semantic: f32, keyword: f32) -> f32 {
    (alpha * semantic + (1.0 - alpha) * keyword).clamp(0.0, 1.0)
}

/// Merges semantic results and keyword hits on `(file_path, start_line)`
/// and scores each entry with [`fuse`].
///
/// The output is unsorted; semantic entries keep their order and
/// keyword-only entries follow.
pub fn merge(alpha: f32, semantic: Vec<SearchResult>, keyword: Vec<KeywordHit>) -> Vec<SearchResult> {
    let normalized =
        normalize_keyword_scores(&keyword.iter().map(|hit| hit.score).collect::<Vec<_>>());

    let mut merged: Vec<SearchResult> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut positions: HashMap<(String, usize), usize> = HashMap::new();

    for mut result in semantic {
        let key = (result.file_path.clone(), result.start_line);
        if positions.contains_key(&key) {
            continue;
        }
        result.keyword_score = 0.0;
        positions.insert(key, merged.len());
        merged.push(result);
    }

    for (hit, keyword_score) in keyword.into_iter().zip(normalized) {
        let key = (hit.metadata.file_path.clone(), hit.metadata.start_line);
        match positions.get(&key) {
            Some(&idx) => {
                let entry = &mut merged[idx];
                entry.keyword_score = entry.keyword_score.max(keyword_score);
            }
            None => {
                positions.insert(key, merged.len());
                let mut result = SearchResult::from_parts(hit.document, hit.metadata, 0.0);
                result.keyword_score = keyword_score;
                merged.push(result);
            }
        }
    }

    for result in merged.iter_mut() {
        result.score = fuse(alpha, result.semantic_score, result.keyword_score);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::storage::ChunkMetadata;
    use crate::embedding::ChunkType;

    fn metadata(path: &str, start: usize) -> ChunkMetadata {
        ChunkMetadata {
            file_path: path.to_string(),
            start_line: start,
            end_line: start + 4,
            chunk_type: ChunkType::Function,
            name: "f".to_string(),
            language: "python".to_string(),
        }
    }

    fn semantic(path: &str, start: usize, score: f32) -> SearchResult {
        SearchResult::from_parts(format!("{}:{}", path, start), metadata(path, start), score)
    }

    fn keyword(path: &str, start: usize, score: f32) -> KeywordHit {
        KeywordHit {
            document: format!("{}:{}", path, start),
            metadata: metadata(path, start),
            score,
        }
    }

    #[test]
    fn test_validate_alpha() {
        assert!(validate_alpha(0.0).is_ok());
        assert!(validate_alpha(1.0).is_ok());
        assert!(validate_alpha(0.5).is_ok());

        let err = validate_alpha(1.5).unwrap_err();
        assert!(err.downcast_ref::<InvalidAlphaError>().is_some());
        assert!(validate_alpha(-0.1).is_err());
        assert!(validate_alpha(f32::NAN).is_err());
    }

    #[test]
    fn test_fetch_k() {
        assert_eq!(fetch_k(5, false, 20), 15);
        assert_eq!(fetch_k(50, false, 20), 100);
        assert_eq!(fetch_k(5, true, 20), 20);
    }

    #[test]
    fn test_distance_to_score() {
        assert_eq!(distance_to_score(0.0), 1.0);
        assert_eq!(distance_to_score(1.0), 0.5);
        assert_eq!(distance_to_score(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_normalize_keyword_scores() {
        let norms = normalize_keyword_scores(&[10.0, 5.0]);
        assert!((norms[0] - 1.0).abs() < 0.001);
        assert!((norms[1] - 0.5).abs() < 0.001);

        assert_eq!(normalize_keyword_scores(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(normalize_keyword_scores(&[]).is_empty());
    }

    #[test]
    fn test_normalize_min_max() {
        assert_eq!(normalize_min_max(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize_min_max(&[-3.0, -3.0]), vec![0.0, 0.0]);
        assert_eq!(normalize_min_max(&[7.5]), vec![0.0]);
        assert!(normalize_min_max(&[]).is_empty());
    }

    #[test]
    fn test_normalize_min_max_non_finite() {
        assert_eq!(
            normalize_min_max(&[f32::NAN, 2.0, 4.0, f32::INFINITY]),
            vec![0.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(normalize_min_max(&[f32::NAN, f32::NAN]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_alpha_extremes() {
        let sem = 0.37;
        assert_eq!(fuse(1.0, sem, 0.9), sem);
        assert_eq!(fuse(0.0, sem, 0.9), 0.9);
        assert!((fuse(0.5, 1.0, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_merge_joins_on_path_and_start_line() {
        let merged = merge(
            0.5,
            vec![semantic("a.py", 1, 0.8), semantic("b.py", 1, 0.4)],
            vec![keyword("a.py", 1, 6.0), keyword("c.py", 10, 3.0)],
        );

        assert_eq!(merged.len(), 3);
        let a = merged.iter().find(|r| r.file_path == "a.py").unwrap();
        assert!((a.keyword_score - 1.0).abs() < 1e-6);
        assert!((a.score - 0.9).abs() < 1e-6);

        let b = merged.iter().find(|r| r.file_path == "b.py").unwrap();
        assert_eq!(b.keyword_score, 0.0);
        assert!((b.score - 0.2).abs() < 1e-6);

        let c = merged.iter().find(|r| r.file_path == "c.py").unwrap();
        assert_eq!(c.semantic_score, 0.0);
        assert!((c.keyword_score - 0.5).abs() < 1e-6);
        assert!((c.score - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_merge_alpha_one_keeps_semantic_score() {
        let merged = merge(
            1.0,
            vec![semantic("a.py", 1, 0.61)],
            vec![keyword("a.py", 1, 2.0)],
        );
        assert_eq!(merged[0].score, merged[0].semantic_score);
    }
}
