// src/error.rs

use thiserror::Error;

/// Errors surfaced by fitting and prediction.
///
/// Unknown ids, too few neighbors and a zero aggregation weight are not errors:
/// those cases resolve to the global mean and are reported through
/// [`crate::knn::PredictionSource`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KnnError {
    #[error("The model has not been fit. Call `fit` before requesting predictions.")]
    NotFit,
    #[error("Fitting was cancelled before the similarity matrix was complete.")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Training data contains no ratings.")]
    EmptyTrainingData,
    #[error("Rating {rating} for user {user} and item {item} is not a finite number.")]
    InvalidRating { user: u64, item: u64, rating: f64 },
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}
