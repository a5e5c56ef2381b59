// src/centering.rs

use crate::similarity::present_mean;
use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Which centering the weighted vote applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnnVariant {
    /// Raw neighbor ratings.
    #[default]
    Basic,
    /// Ratings centered by each entity's mean rating.
    Centered,
    /// Ratings centered by each entity's baseline bias.
    Baseline,
}

/// Fitted centering strategy: the value subtracted from each neighbor's rating
/// before aggregation and added back for the query entity afterwards.
#[derive(Clone, Debug)]
pub enum Centering {
    None,
    Mean(Array1<f64>),
    Bias(Array1<f64>),
}

impl Centering {
    /// Per-entity means of the present ratings in each row.
    ///
    /// A row without any rating has no mean; it is assigned `fallback` (the global
    /// mean) so the vector never holds NaN.
    pub fn means(ratings: ArrayView2<Option<f64>>, fallback: f64) -> Self {
        let mut num_empty = 0usize;
        let means = ratings.map_axis(Axis(1), |row| match present_mean(&row) {
            Some(mean) => mean,
            None => {
                num_empty += 1;
                fallback
            }
        });
        if num_empty > 0 {
            debug!("{} entities have no ratings; their mean defaults to the global mean.", num_empty);
        }
        Centering::Mean(means)
    }

    pub fn bias(bias: ArrayView1<f64>) -> Self {
        Centering::Bias(bias.to_owned())
    }

    /// Centering value for entity `entity_id`.
    #[inline]
    pub fn term(&self, entity_id: usize) -> f64 {
        match self {
            Centering::None => 0.0,
            Centering::Mean(means) => means[entity_id],
            Centering::Bias(bias) => bias[entity_id],
        }
    }
}
