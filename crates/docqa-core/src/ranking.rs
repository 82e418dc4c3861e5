//! Score conventions and the ordering every index adapter applies.
//!
//! Scores are higher-is-better for every metric. Equal scores are ordered by
//! insertion recency: the record indexed last comes first.

use std::cmp::Ordering;

use crate::types::{Metric, RetrievalMatch};

/// Sort matches by descending score, then by descending `indexed_seq`, and keep `k`.
pub fn rank_matches(mut matches: Vec<RetrievalMatch>, k: usize) -> Vec<RetrievalMatch> {
    matches.sort_by(compare_matches);
    matches.truncate(k);
    matches
}

pub fn compare_matches(a: &RetrievalMatch, b: &RetrievalMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.indexed_seq.cmp(&a.indexed_seq))
}

/// Similarity of two vectors under `metric`.
pub fn similarity(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => {
            let dot = dot(a, b);
            let norm = (dot_self(a) * dot_self(b)).sqrt();
            if norm <= f32::EPSILON { 0.0 } else { dot / norm }
        }
        Metric::Dot => dot(a, b),
        Metric::Euclidean => {
            let d2: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
            distance_to_score(metric, d2)
        }
    }
}

/// Convert an index-reported distance into a score.
///
/// Cosine and dot distances are `1 - similarity`; euclidean distances are
/// squared L2 and map to `1 / (1 + d)`.
pub fn distance_to_score(metric: Metric, distance: f32) -> f32 {
    match metric {
        Metric::Cosine | Metric::Dot => 1.0 - distance,
        Metric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dot_self(a: &[f32]) -> f32 {
    dot(a, a)
}
