// src/train_set.rs

use crate::error::KnnError;
use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;

// --- Id Mapping ---

/// Bidirectional mapping between external ids and dense inner indices.
///
/// Inner indices are assigned contiguously from zero in order of first insertion.
#[derive(Clone, Debug, Default)]
pub struct IdIndex {
    to_inner: HashMap<u64, usize>,
    to_raw: Vec<u64>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the inner index for `raw_id`, assigning the next free one if it is new.
    pub fn insert(&mut self, raw_id: u64) -> usize {
        if let Some(&inner) = self.to_inner.get(&raw_id) {
            return inner;
        }
        let inner = self.to_raw.len();
        self.to_inner.insert(raw_id, inner);
        self.to_raw.push(raw_id);
        inner
    }

    /// Inner index of `raw_id`, or `None` if the id was never seen.
    pub fn to_inner(&self, raw_id: u64) -> Option<usize> {
        self.to_inner.get(&raw_id).copied()
    }

    pub fn to_raw(&self, inner_id: usize) -> Option<u64> {
        self.to_raw.get(inner_id).copied()
    }

    pub fn len(&self) -> usize {
        self.to_raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_raw.is_empty()
    }
}

// --- Trait for Abstracting Training Data Access ---

/// Defines how the neighborhood model reads its training ratings.
///
/// Rating matrices use `None` for an absent rating. Rows of `user_ratings` are
/// inner user indices and columns are inner item indices; `item_ratings` is the
/// transpose.
pub trait RatingDataAccessor: Sync {
    /// Mean of every present rating in the training data.
    fn global_mean(&self) -> f64;

    /// Users × items rating matrix.
    fn user_ratings(&self) -> ArrayView2<'_, Option<f64>>;

    /// Items × users rating matrix.
    fn item_ratings(&self) -> ArrayView2<'_, Option<f64>> {
        self.user_ratings().reversed_axes()
    }

    fn user_ids(&self) -> &IdIndex;

    fn item_ids(&self) -> &IdIndex;

    fn num_users(&self) -> usize {
        self.user_ids().len()
    }

    fn num_items(&self) -> usize {
        self.item_ids().len()
    }

    /// Maps an external user id to its inner index. `None` means unknown.
    fn convert_user_id(&self, raw_user_id: u64) -> Option<usize> {
        self.user_ids().to_inner(raw_user_id)
    }

    /// Maps an external item id to its inner index. `None` means unknown.
    fn convert_item_id(&self, raw_item_id: u64) -> Option<usize> {
        self.item_ids().to_inner(raw_item_id)
    }
}

// --- In-memory Training Set ---

/// Dense in-memory training set built from `(user, item, rating)` triples.
#[derive(Clone, Debug)]
pub struct TrainSet {
    ratings: Array2<Option<f64>>,
    user_ids: IdIndex,
    item_ids: IdIndex,
    global_mean: f64,
    num_ratings: usize,
}

impl TrainSet {
    /// Builds a training set from rating triples.
    ///
    /// Users and items receive inner indices in order of first appearance. When a
    /// `(user, item)` pair occurs more than once, the last rating wins.
    ///
    /// # Errors
    /// Returns [`KnnError::EmptyTrainingData`] for an empty slice and
    /// [`KnnError::InvalidRating`] if any rating is NaN or infinite.
    pub fn from_triples(triples: &[(u64, u64, f64)]) -> Result<Self, KnnError> {
        if triples.is_empty() {
            return Err(KnnError::EmptyTrainingData);
        }

        let mut user_ids = IdIndex::new();
        let mut item_ids = IdIndex::new();
        let mut inner_triples = Vec::with_capacity(triples.len());
        for &(user, item, rating) in triples {
            if !rating.is_finite() {
                return Err(KnnError::InvalidRating { user, item, rating });
            }
            inner_triples.push((user_ids.insert(user), item_ids.insert(item), rating));
        }

        let mut ratings = Array2::<Option<f64>>::from_elem((user_ids.len(), item_ids.len()), None);
        let mut num_duplicates = 0usize;
        for (inner_user, inner_item, rating) in inner_triples {
            let cell = &mut ratings[[inner_user, inner_item]];
            if cell.is_some() {
                num_duplicates += 1;
            }
            *cell = Some(rating);
        }
        if num_duplicates > 0 {
            warn!(
                "{} duplicate (user, item) ratings found; keeping the last occurrence of each.",
                num_duplicates
            );
        }

        let (sum, num_ratings) = ratings
            .iter()
            .flatten()
            .fold((0.0f64, 0usize), |(sum, count), &r| (sum + r, count + 1));
        let global_mean = sum / num_ratings as f64;

        debug!(
            "Built training set: {} users, {} items, {} ratings, global mean {:.4}.",
            user_ids.len(),
            item_ids.len(),
            num_ratings,
            global_mean
        );

        Ok(Self {
            ratings,
            user_ids,
            item_ids,
            global_mean,
            num_ratings,
        })
    }

    /// Number of distinct present ratings.
    pub fn num_ratings(&self) -> usize {
        self.num_ratings
    }
}

impl RatingDataAccessor for TrainSet {
    fn global_mean(&self) -> f64 {
        self.global_mean
    }

    fn user_ratings(&self) -> ArrayView2<'_, Option<f64>> {
        self.ratings.view()
    }

    fn user_ids(&self) -> &IdIndex {
        &self.user_ids
    }

    fn item_ids(&self) -> &IdIndex {
        &self.item_ids
    }
}
