// src/neighbors.rs

use crate::similarity_matrix::SimilarityMatrix;
use ndarray::ArrayView2;
use std::cmp::Ordering;

/// A neighbor of the query entity together with its similarity to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub entity_id: usize,
    pub similarity: f64,
    /// The neighbor's rating at the target cross index.
    pub rating: f64,
}

/// Outcome of neighbor selection for one prediction.
#[derive(Clone, Debug, PartialEq)]
pub enum NeighborSelection {
    /// Top neighbors, sorted by descending similarity.
    Neighbors(Vec<Candidate>),
    /// No more than `min_k` qualifying candidates were found.
    Insufficient { found: usize },
}

/// Selects the neighborhood of `left_id` for cross index `right_id`.
///
/// A candidate is any other entity that rated `right_id` and has a defined
/// similarity to `left_id`. With `min_k` or fewer candidates the selection is
/// [`NeighborSelection::Insufficient`]. Otherwise candidates are stably sorted by
/// descending similarity (equal similarities keep index order) and truncated to `k`.
pub fn select_neighbors(
    similarities: &SimilarityMatrix,
    ratings: ArrayView2<Option<f64>>,
    left_id: usize,
    right_id: usize,
    k: usize,
    min_k: usize,
) -> NeighborSelection {
    let mut candidates: Vec<Candidate> = ratings
        .column(right_id)
        .indexed_iter()
        .filter(|&(other_id, _)| other_id != left_id)
        .filter_map(|(other_id, rating)| {
            let rating = (*rating)?;
            let similarity = similarities.get(left_id, other_id)?;
            Some(Candidate {
                entity_id: other_id,
                similarity,
                rating,
            })
        })
        .collect();

    if candidates.len() <= min_k {
        return NeighborSelection::Insufficient { found: candidates.len() };
    }

    candidates.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
    candidates.truncate(k);
    NeighborSelection::Neighbors(candidates)
}
