//! Similarity scoring and top-k ranking over embedding matrices.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use std::cmp::Ordering;

use super::normalize::l2_norm;
use crate::error::{EmbedError, Result};

/// How two embeddings are compared.
///
/// Services that normalize their output compare with a plain dot product,
/// which is then equal to cosine similarity; the others divide by the norms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    Dot,
    Cosine,
}

impl SimilarityMetric {
    pub fn for_normalized(normalized: bool) -> Self {
        if normalized {
            SimilarityMetric::Dot
        } else {
            SimilarityMetric::Cosine
        }
    }
}

/// Highest-scoring candidates, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopK {
    pub indices: Vec<usize>,
    pub scores: Vec<f32>,
}

impl TopK {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.scores.iter().copied())
    }
}

/// Cosine similarity. Returns 0.0 when either vector has zero length.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(&b) / (norm_a * norm_b)
}

/// Compare two embeddings with `metric`.
pub fn similarity(
    metric: SimilarityMetric,
    a: ArrayView1<'_, f32>,
    b: ArrayView1<'_, f32>,
) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbedError::InvalidArgument(format!(
            "embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    Ok(match metric {
        SimilarityMetric::Dot => a.dot(&b),
        SimilarityMetric::Cosine => cosine_similarity(a, b),
    })
}

/// Score `query` against every row of `candidates`.
pub fn score_candidates(
    metric: SimilarityMetric,
    query: ArrayView1<'_, f32>,
    candidates: ArrayView2<'_, f32>,
) -> Result<Array1<f32>> {
    if candidates.nrows() == 0 {
        return Ok(Array1::zeros(0));
    }

    if candidates.ncols() != query.len() {
        return Err(EmbedError::InvalidArgument(format!(
            "query has dimension {} but candidates have {}",
            query.len(),
            candidates.ncols()
        )));
    }

    let dots = candidates.dot(&query);

    Ok(match metric {
        SimilarityMetric::Dot => dots,
        SimilarityMetric::Cosine => {
            let query_norm = l2_norm(query);
            let norms = candidates.map_axis(Axis(1), l2_norm);
            ndarray::Zip::from(&dots)
                .and(&norms)
                .map_collect(|&dot, &norm| {
                    if norm == 0.0 || query_norm == 0.0 {
                        0.0
                    } else {
                        dot / (norm * query_norm)
                    }
                })
        }
    })
}

/// Rank scores descending and keep the best `min(k, n)`.
///
/// Equal scores keep their original order. NaN scores rank last.
pub fn rank(scores: ArrayView1<'_, f32>, k: usize) -> TopK {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| descending(a.1, b.1));
    ranked.truncate(k);

    let (indices, scores) = ranked.into_iter().unzip();
    TopK { indices, scores }
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Find the `k` candidates most similar to `query`.
pub fn top_k(
    metric: SimilarityMetric,
    query: ArrayView1<'_, f32>,
    candidates: ArrayView2<'_, f32>,
    k: usize,
) -> Result<TopK> {
    let scores = score_candidates(metric, query, candidates)?;
    Ok(rank(scores.view(), k))
}
