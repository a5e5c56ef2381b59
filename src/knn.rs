// src/knn.rs

use crate::baseline::{BaselineBiases, BaselineConfig, SgdBaseline};
use crate::centering::{Centering, KnnVariant};
use crate::error::KnnError;
use crate::neighbors::{select_neighbors, NeighborSelection};
use crate::similarity::SimilarityMetric;
use crate::similarity_matrix::SimilarityMatrix;
use crate::train_set::{IdIndex, RatingDataAccessor};
use log::{debug, info, trace};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

// --- Configuration ---

/// Whether neighbors are users (who rated the item) or items (rated by the user).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    UserBased,
    ItemBased,
}

impl Orientation {
    /// Splits a `(user, item)` pair into `(query entity, cross index)`.
    #[inline]
    pub fn split<T>(self, user: T, item: T) -> (T, T) {
        match self {
            Orientation::UserBased => (user, item),
            Orientation::ItemBased => (item, user),
        }
    }

    /// Rating matrix with entities of this orientation as rows.
    pub fn ratings<D: RatingDataAccessor>(self, data: &D) -> ArrayView2<'_, Option<f64>> {
        match self {
            Orientation::UserBased => data.user_ratings(),
            Orientation::ItemBased => data.item_ratings(),
        }
    }

    /// Bias vector matching the entities of this orientation.
    pub fn biases<B: BaselineBiases + ?Sized>(self, baseline: &B) -> ArrayView1<'_, f64> {
        match self {
            Orientation::UserBased => baseline.user_bias(),
            Orientation::ItemBased => baseline.item_bias(),
        }
    }
}

/// Configuration for fitting a [`Knn`] model.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct KnnConfig {
    pub similarity: SimilarityMetric,
    pub orientation: Orientation,
    /// Maximum number of neighbors aggregated per prediction.
    pub k: usize,
    /// A prediction needs more than `min_k` candidates, otherwise it is the global mean.
    pub min_k: usize,
    /// Settings of the SGD baseline used by [`KnnVariant::Baseline`] when no
    /// estimator is supplied.
    pub baseline: BaselineConfig,
}

impl Default for KnnConfig {
    fn default() -> Self {
        KnnConfig {
            similarity: SimilarityMetric::Msd,
            orientation: Orientation::UserBased,
            k: 40,
            min_k: 1,
            baseline: BaselineConfig::default(),
        }
    }
}

impl KnnConfig {
    pub fn with_similarity(mut self, similarity: SimilarityMetric) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_min_k(mut self, min_k: usize) -> Self {
        self.min_k = min_k;
        self
    }

    pub fn with_baseline(mut self, baseline: BaselineConfig) -> Self {
        self.baseline = baseline;
        self
    }

    fn validate(&self) -> Result<(), KnnError> {
        if self.k == 0 {
            return Err(KnnError::InvalidConfig("k (maximum neighborhood size) must be at least 1".into()));
        }
        Ok(())
    }
}

// --- Prediction Output ---

/// Which path produced a prediction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionSource {
    /// Weighted vote over `used` neighbors.
    Neighbors { used: usize },
    /// The user or the item is absent from the training data.
    UnknownEntity,
    /// Only `found` candidates, not more than `min_k`.
    InsufficientNeighbors { found: usize },
    /// The selected neighbors' similarities sum to zero.
    ZeroAggregationWeight,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub value: f64,
    pub source: PredictionSource,
}

impl Prediction {
    /// True if the value is the global mean fallback.
    pub fn is_fallback(&self) -> bool {
        !matches!(self.source, PredictionSource::Neighbors { .. })
    }
}

// --- Fitted State ---

/// Everything a prediction reads. Immutable once built.
#[derive(Clone, Debug)]
struct FittedKnn {
    config: KnnConfig,
    global_mean: f64,
    /// Entities of the active orientation as rows.
    ratings: Array2<Option<f64>>,
    similarities: SimilarityMatrix,
    centering: Centering,
    user_ids: IdIndex,
    item_ids: IdIndex,
}

impl FittedKnn {
    fn fallback(&self, source: PredictionSource) -> Prediction {
        Prediction {
            value: self.global_mean,
            source,
        }
    }

    fn predict(&self, raw_user_id: u64, raw_item_id: u64) -> Prediction {
        let (Some(inner_user), Some(inner_item)) = (
            self.user_ids.to_inner(raw_user_id),
            self.item_ids.to_inner(raw_item_id),
        ) else {
            trace!("Unknown user {} or item {}; predicting global mean.", raw_user_id, raw_item_id);
            return self.fallback(PredictionSource::UnknownEntity);
        };
        let (left_id, right_id) = self.config.orientation.split(inner_user, inner_item);

        let neighbors = match select_neighbors(
            &self.similarities,
            self.ratings.view(),
            left_id,
            right_id,
            self.config.k,
            self.config.min_k,
        ) {
            NeighborSelection::Neighbors(neighbors) => neighbors,
            NeighborSelection::Insufficient { found } => {
                trace!(
                    "Only {} candidate neighbors for user {} / item {} (min_k = {}); predicting global mean.",
                    found,
                    raw_user_id,
                    raw_item_id,
                    self.config.min_k
                );
                return self.fallback(PredictionSource::InsufficientNeighbors { found });
            }
        };

        let mut weight_sum = 0.0f64;
        let mut weighted_rating = 0.0f64;
        for neighbor in &neighbors {
            weight_sum += neighbor.similarity;
            weighted_rating +=
                neighbor.similarity * (neighbor.rating - self.centering.term(neighbor.entity_id));
        }
        if weight_sum == 0.0 {
            trace!("Neighbor weights for user {} / item {} sum to zero.", raw_user_id, raw_item_id);
            return self.fallback(PredictionSource::ZeroAggregationWeight);
        }

        let value = weighted_rating / weight_sum + self.centering.term(left_id);
        if !value.is_finite() {
            trace!("Non-finite weighted vote for user {} / item {}.", raw_user_id, raw_item_id);
            return self.fallback(PredictionSource::ZeroAggregationWeight);
        }
        Prediction {
            value,
            source: PredictionSource::Neighbors { used: neighbors.len() },
        }
    }
}

// --- Model ---

/// Neighborhood-based collaborative filtering model.
///
/// Predicts a rating as the similarity-weighted vote of the `k` most similar
/// users (or items) that rated the target, optionally centered by each
/// entity's mean or baseline bias. Fit once, then call [`Knn::predict`] as
/// often as needed; prediction only reads the fitted state and is safe to call
/// from several threads.
///
/// # Examples
///
/// ```
/// use efficient_knn::{Knn, KnnConfig, TrainSet};
///
/// let data = TrainSet::from_triples(&[
///     (1, 10, 4.0), (1, 20, 3.0), (1, 30, 5.0),
///     (2, 10, 4.0), (2, 20, 3.0), (2, 30, 5.0),
///     (3, 10, 4.0), (3, 20, 3.0),
/// ]).unwrap();
/// let mut knn = Knn::basic();
/// knn.fit(&data, KnnConfig::default().with_min_k(0)).unwrap();
/// let rating = knn.predict(3, 30).unwrap();
/// assert!((rating - 5.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Knn {
    variant: KnnVariant,
    fitted: Option<FittedKnn>,
}

impl Knn {
    /// Creates an unfit model of the given variant.
    pub fn new(variant: KnnVariant) -> Self {
        Self {
            variant,
            fitted: None,
        }
    }

    pub fn basic() -> Self {
        Self::new(KnnVariant::Basic)
    }

    pub fn centered() -> Self {
        Self::new(KnnVariant::Centered)
    }

    pub fn baseline() -> Self {
        Self::new(KnnVariant::Baseline)
    }

    /// Fits the model: builds the similarity matrix and the centering terms.
    ///
    /// For [`KnnVariant::Baseline`] an [`SgdBaseline`] is fitted on `data` with
    /// `config.baseline`. Refitting replaces the previous state only on success.
    ///
    /// # Errors
    /// Returns [`KnnError::InvalidConfig`] if `config.k == 0` or the baseline
    /// settings are invalid, and [`KnnError::DimensionMismatch`] if the rating
    /// matrix does not have one row per user id and one column per item id.
    pub fn fit<D: RatingDataAccessor>(&mut self, data: &D, config: KnnConfig) -> Result<(), KnnError> {
        self.fit_inner(data, config, None, None)
    }

    /// Like [`Knn::fit`], but stops with [`KnnError::Cancelled`] once `cancel` is set.
    pub fn fit_cancellable<D: RatingDataAccessor>(
        &mut self,
        data: &D,
        config: KnnConfig,
        cancel: &AtomicBool,
    ) -> Result<(), KnnError> {
        self.fit_inner(data, config, None, Some(cancel))
    }

    /// Fits a [`KnnVariant::Baseline`] model with biases from an already fitted estimator.
    ///
    /// # Errors
    /// Returns [`KnnError::InvalidConfig`] if the model is not the baseline variant,
    /// and [`KnnError::DimensionMismatch`] if the bias vector for the active
    /// orientation does not match the number of entities.
    pub fn fit_with_baseline<D: RatingDataAccessor, B: BaselineBiases>(
        &mut self,
        data: &D,
        config: KnnConfig,
        baseline: &B,
    ) -> Result<(), KnnError> {
        if self.variant != KnnVariant::Baseline {
            return Err(KnnError::InvalidConfig(format!(
                "a baseline estimator was supplied to a {:?} model",
                self.variant
            )));
        }
        self.fit_inner(data, config, Some(baseline as &dyn BaselineBiases), None)
    }

    fn fit_inner<D: RatingDataAccessor>(
        &mut self,
        data: &D,
        config: KnnConfig,
        baseline: Option<&dyn BaselineBiases>,
        cancel: Option<&AtomicBool>,
    ) -> Result<(), KnnError> {
        config.validate()?;
        let expected_dim = (data.user_ids().len(), data.item_ids().len());
        if data.user_ratings().dim() != expected_dim {
            return Err(KnnError::DimensionMismatch(format!(
                "rating matrix is {:?} but the id indices list {} users and {} items",
                data.user_ratings().dim(),
                expected_dim.0,
                expected_dim.1
            )));
        }
        let start_time = std::time::Instant::now();
        let global_mean = data.global_mean();
        let ratings = config.orientation.ratings(data);
        info!(
            "Fitting {:?} KNN ({:?}, k={}, min_k={}) on {} users and {} items.",
            self.variant,
            config.orientation,
            config.k,
            config.min_k,
            data.num_users(),
            data.num_items()
        );

        let centering = match self.variant {
            KnnVariant::Basic => Centering::None,
            KnnVariant::Centered => Centering::means(ratings, global_mean),
            KnnVariant::Baseline => {
                let fitted_baseline;
                let biases = match baseline {
                    Some(external) => config.orientation.biases(external),
                    None => {
                        fitted_baseline = SgdBaseline::fit(data, &config.baseline)?;
                        config.orientation.biases(&fitted_baseline)
                    }
                };
                if biases.len() != ratings.nrows() {
                    return Err(KnnError::DimensionMismatch(format!(
                        "baseline provides {} biases but the training data has {} {:?} entities",
                        biases.len(),
                        ratings.nrows(),
                        config.orientation
                    )));
                }
                Centering::bias(biases)
            }
        };
        debug!("Prepared {:?} centering terms.", self.variant);

        let similarities = SimilarityMatrix::build(ratings, &config.similarity, cancel)?;

        self.fitted = Some(FittedKnn {
            config,
            global_mean,
            ratings: ratings.to_owned(),
            similarities,
            centering,
            user_ids: data.user_ids().clone(),
            item_ids: data.item_ids().clone(),
        });
        info!("KNN fit completed in {:?}", start_time.elapsed());
        Ok(())
    }

    /// Predicts the rating of `raw_user_id` for `raw_item_id`.
    ///
    /// Unknown ids, too few neighbors and a zero total weight all yield the
    /// global mean.
    ///
    /// # Errors
    /// Returns [`KnnError::NotFit`] if the model has not been fit.
    pub fn predict(&self, raw_user_id: u64, raw_item_id: u64) -> Result<f64, KnnError> {
        self.predict_detailed(raw_user_id, raw_item_id).map(|p| p.value)
    }

    /// Like [`Knn::predict`], also reporting how the value was obtained.
    pub fn predict_detailed(&self, raw_user_id: u64, raw_item_id: u64) -> Result<Prediction, KnnError> {
        let fitted = self.fitted.as_ref().ok_or(KnnError::NotFit)?;
        Ok(fitted.predict(raw_user_id, raw_item_id))
    }

    /// Predicts every `(user, item)` pair in parallel. Output order matches input order.
    pub fn predict_batch(&self, pairs: &[(u64, u64)]) -> Result<Vec<f64>, KnnError> {
        let fitted = self.fitted.as_ref().ok_or(KnnError::NotFit)?;
        Ok(pairs
            .par_iter()
            .map(|&(user, item)| fitted.predict(user, item).value)
            .collect())
    }

    pub fn is_fit(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn variant(&self) -> KnnVariant {
        self.variant
    }

    /// Configuration of the last successful fit.
    pub fn config(&self) -> Option<&KnnConfig> {
        self.fitted.as_ref().map(|f| &f.config)
    }

    pub fn global_mean(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.global_mean)
    }

    pub fn similarity_matrix(&self) -> Option<&SimilarityMatrix> {
        self.fitted.as_ref().map(|f| &f.similarities)
    }

    /// Centering value of an entity (inner index, active orientation).
    pub fn centering_term(&self, entity_id: usize) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.centering.term(entity_id))
    }
}
