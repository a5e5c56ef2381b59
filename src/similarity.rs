// src/similarity.rs

//! Similarity metrics between two rating vectors.
//!
//! Every metric looks only at co-rated positions (both vectors hold a rating),
//! returns `None` when fewer than two such positions exist or when the metric is
//! undefined on them, and is symmetric in its arguments.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Minimum number of co-rated positions for any metric to be defined.
pub const MIN_CO_RATED: usize = 2;

/// Signature of a caller-supplied similarity metric.
pub type SimilarityFn = fn(ArrayView1<Option<f64>>, ArrayView1<Option<f64>>) -> Option<f64>;

/// The similarity metric used to build the pairwise similarity matrix.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub enum SimilarityMetric {
    /// `1 / (1 + mean squared difference)`, in (0, 1].
    #[default]
    Msd,
    /// Cosine of the co-rated sub-vectors, in [-1, 1].
    Cosine,
    /// Correlation of mean-centered ratings, in [-1, 1].
    Pearson,
    /// Any function honoring the co-rated contract above.
    #[serde(skip)]
    Custom(SimilarityFn),
}

impl SimilarityMetric {
    pub fn compute(&self, a: ArrayView1<Option<f64>>, b: ArrayView1<Option<f64>>) -> Option<f64> {
        match self {
            SimilarityMetric::Msd => msd(a, b),
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Pearson => pearson(a, b),
            SimilarityMetric::Custom(f) => f(a, b),
        }
    }
}

/// Pairs of values at positions where both vectors hold a rating.
fn co_rated<'a>(
    a: &'a ArrayView1<Option<f64>>,
    b: &'a ArrayView1<Option<f64>>,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    debug_assert_eq!(a.len(), b.len(), "rating vectors must have the same length");
    a.iter().zip(b.iter()).filter_map(|(x, y)| match (x, y) {
        (Some(x), Some(y)) => Some((*x, *y)),
        _ => None,
    })
}

/// Mean of the present entries of `v`, `None` if it has none.
pub fn present_mean(v: &ArrayView1<Option<f64>>) -> Option<f64> {
    let (sum, count) = v
        .iter()
        .flatten()
        .fold((0.0f64, 0usize), |(sum, count), &r| (sum + r, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Mean-squared-difference similarity: `1 / (1 + msd)` over the co-rated subset.
pub fn msd(a: ArrayView1<Option<f64>>, b: ArrayView1<Option<f64>>) -> Option<f64> {
    let (sum_sq, count) = co_rated(&a, &b).fold((0.0f64, 0usize), |(sum_sq, count), (x, y)| {
        (sum_sq + (x - y) * (x - y), count + 1)
    });
    if count < MIN_CO_RATED {
        return None;
    }
    Some(1.0 / (1.0 + sum_sq / count as f64))
}

/// Cosine similarity over the co-rated subset.
pub fn cosine(a: ArrayView1<Option<f64>>, b: ArrayView1<Option<f64>>) -> Option<f64> {
    cosine_of_pairs(co_rated(&a, &b))
}

/// Pearson correlation.
///
/// Each vector is centered by the mean of all of its own ratings (not only the
/// co-rated ones); the cosine of the centered co-rated sub-vectors is returned.
pub fn pearson(a: ArrayView1<Option<f64>>, b: ArrayView1<Option<f64>>) -> Option<f64> {
    let mean_a = present_mean(&a)?;
    let mean_b = present_mean(&b)?;
    cosine_of_pairs(co_rated(&a, &b).map(|(x, y)| (x - mean_a, y - mean_b)))
}

fn cosine_of_pairs(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let mut dot = 0.0f64;
    let mut norm_a_sq = 0.0f64;
    let mut norm_b_sq = 0.0f64;
    let mut count = 0usize;
    for (x, y) in pairs {
        dot += x * y;
        norm_a_sq += x * x;
        norm_b_sq += y * y;
        count += 1;
    }
    if count < MIN_CO_RATED {
        return None;
    }
    let denom = norm_a_sq.sqrt() * norm_b_sq.sqrt();
    if denom == 0.0 {
        // Zero vector on the co-rated subset (constant ratings for Pearson).
        return None;
    }
    Some(dot / denom)
}
