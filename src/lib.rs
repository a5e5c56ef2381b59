// Neighborhood-based collaborative filtering (KNN)

#![doc = include_str!("../README.md")]

pub mod baseline;
pub mod centering;
pub mod error;
pub mod knn;
pub mod neighbors;
pub mod similarity;
pub mod similarity_matrix;
pub mod train_set;


pub use baseline::{BaselineBiases, BaselineConfig, SgdBaseline};
pub use centering::KnnVariant;
pub use error::KnnError;
pub use knn::{Knn, KnnConfig, Orientation, Prediction, PredictionSource};
pub use similarity::SimilarityMetric;
pub use similarity_matrix::{SimilarityCell, SimilarityMatrix};
pub use train_set::{IdIndex, RatingDataAccessor, TrainSet};
