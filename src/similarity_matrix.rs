// src/similarity_matrix.rs

use crate::error::KnnError;
use crate::similarity::SimilarityMetric;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// State of one cell of the similarity matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimilarityCell {
    /// Not computed yet. Only seen during a build and on the diagonal.
    Uncomputed,
    /// Computed, but the metric is undefined for this pair. Never recomputed.
    Undefined,
    Defined(f64),
}

impl SimilarityCell {
    pub fn value(self) -> Option<f64> {
        match self {
            SimilarityCell::Defined(v) => Some(v),
            _ => None,
        }
    }
}

/// Symmetric matrix of pairwise similarities between the rows of a rating matrix.
///
/// `get(i, j) == get(j, i)` for every `i != j`. The diagonal is left
/// `Uncomputed` and is never consulted.
#[derive(Clone, Debug)]
pub struct SimilarityMatrix {
    cells: Array2<SimilarityCell>,
}

impl SimilarityMatrix {
    /// Computes the similarity of every pair of rows in `ratings`.
    ///
    /// The build runs in two phases. First each rayon worker owns one row `i` and
    /// fills the strict upper triangle `(i, j > i)`, skipping cells that are
    /// already computed. Then the upper triangle is mirrored into the lower one
    /// in place. No worker ever writes to a row it does not own.
    ///
    /// If `cancel` is set while rows are still pending, the remaining rows are
    /// skipped and [`KnnError::Cancelled`] is returned.
    pub fn build(
        ratings: ArrayView2<Option<f64>>,
        metric: &SimilarityMetric,
        cancel: Option<&AtomicBool>,
    ) -> Result<Self, KnnError> {
        let num_entities = ratings.nrows();
        info!(
            "Building {}x{} similarity matrix with {:?} over vectors of length {}.",
            num_entities,
            num_entities,
            metric,
            ratings.ncols()
        );
        let start_time = std::time::Instant::now();

        let mut cells = Array2::from_elem((num_entities, num_entities), SimilarityCell::Uncomputed);
        let is_cancelled = || cancel.map_or(false, |flag| flag.load(Ordering::Relaxed));

        cells
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(left_id, mut row)| {
                if is_cancelled() {
                    return;
                }
                let left_ratings = ratings.row(left_id);
                for right_id in (left_id + 1)..num_entities {
                    if row[right_id] != SimilarityCell::Uncomputed {
                        continue;
                    }
                    row[right_id] = match metric.compute(left_ratings, ratings.row(right_id)) {
                        Some(sim) if sim.is_finite() => SimilarityCell::Defined(sim),
                        Some(sim) => {
                            warn!(
                                "Similarity metric returned non-finite value {} for pair ({}, {}); treating as undefined.",
                                sim, left_id, right_id
                            );
                            SimilarityCell::Undefined
                        }
                        None => SimilarityCell::Undefined,
                    };
                }
            });

        if is_cancelled() {
            warn!("Similarity matrix build cancelled after {:?}.", start_time.elapsed());
            return Err(KnnError::Cancelled);
        }

        mirror_upper_triangle(&mut cells);

        let matrix = Self { cells };
        let num_defined = matrix.num_defined_pairs();
        let num_pairs = num_entities * num_entities.saturating_sub(1) / 2;
        debug!(
            "Similarity matrix: {} of {} pairs defined, {} undefined.",
            num_defined,
            num_pairs,
            num_pairs - num_defined
        );
        info!("Built similarity matrix in {:?}", start_time.elapsed());
        Ok(matrix)
    }

    /// Similarity between two distinct entities, `None` if undefined.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i == j {
            return None;
        }
        self.cells[[i, j]].value()
    }

    pub fn cell(&self, i: usize, j: usize) -> SimilarityCell {
        self.cells[[i, j]]
    }

    /// Number of entities (rows and columns).
    pub fn len(&self) -> usize {
        self.cells.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.nrows() == 0
    }

    /// Number of unordered pairs `i < j` with a defined similarity.
    pub fn num_defined_pairs(&self) -> usize {
        self.cells
            .indexed_iter()
            .filter(|((i, j), cell)| i < j && matches!(cell, SimilarityCell::Defined(_)))
            .count()
    }

    /// True if every off-diagonal cell equals its mirror.
    pub fn is_symmetric(&self) -> bool {
        let n = self.len();
        (0..n).all(|i| ((i + 1)..n).all(|j| self.cells[[i, j]] == self.cells[[j, i]]))
    }
}

/// Copies every cell `(j, i)` with `j < i` into `(i, j)`, in place.
pub(crate) fn mirror_upper_triangle(cells: &mut Array2<SimilarityCell>) {
    let n = cells.nrows();
    for i in 1..n {
        for j in 0..i {
            cells[[i, j]] = cells[[j, i]];
        }
    }
}
