// src/baseline.rs

use crate::error::KnnError;
use crate::train_set::RatingDataAccessor;
use log::{debug, info};
use ndarray::{Array1, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Per-user and per-item bias vectors, aligned with the training data's inner indices.
pub trait BaselineBiases {
    fn user_bias(&self) -> ArrayView1<'_, f64>;
    fn item_bias(&self) -> ArrayView1<'_, f64>;
}

/// Settings for [`SgdBaseline`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// L2 regularization applied to both bias vectors.
    pub reg: f64,
    /// SGD step size.
    pub learning_rate: f64,
    /// Number of passes over the training ratings.
    pub n_epochs: usize,
    /// Seed for the per-epoch shuffle of the ratings.
    pub random_seed: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            reg: 0.02,
            learning_rate: 0.005,
            n_epochs: 20,
            random_seed: 2025,
        }
    }
}

impl BaselineConfig {
    fn validate(&self) -> Result<(), KnnError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(KnnError::InvalidConfig(format!(
                "baseline learning rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        if !(self.reg.is_finite() && self.reg >= 0.0) {
            return Err(KnnError::InvalidConfig(format!(
                "baseline regularization must be a non-negative finite number, got {}",
                self.reg
            )));
        }
        Ok(())
    }
}

/// Baseline estimate `r_ui = mu + b_u + b_i`, learned by stochastic gradient descent.
#[derive(Clone, Debug)]
pub struct SgdBaseline {
    global_mean: f64,
    user_bias: Array1<f64>,
    item_bias: Array1<f64>,
}

impl SgdBaseline {
    /// Fits user and item biases to the present ratings of `data`.
    ///
    /// Each epoch visits every rating once, in an order shuffled by a `ChaCha8Rng`
    /// seeded from `config.random_seed`, so results are reproducible.
    pub fn fit<D: RatingDataAccessor>(data: &D, config: &BaselineConfig) -> Result<Self, KnnError> {
        config.validate()?;
        let start_time = std::time::Instant::now();

        let global_mean = data.global_mean();
        let ratings = data.user_ratings();
        let mut user_bias = Array1::<f64>::zeros(ratings.nrows());
        let mut item_bias = Array1::<f64>::zeros(ratings.ncols());

        let mut observed: Vec<(usize, usize, f64)> = ratings
            .indexed_iter()
            .filter_map(|((u, i), r)| r.map(|r| (u, i, r)))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        for epoch in 0..config.n_epochs {
            observed.shuffle(&mut rng);
            let mut sum_sq_err = 0.0f64;
            for &(u, i, r) in &observed {
                let err = r - (global_mean + user_bias[u] + item_bias[i]);
                sum_sq_err += err * err;
                user_bias[u] += config.learning_rate * (err - config.reg * user_bias[u]);
                item_bias[i] += config.learning_rate * (err - config.reg * item_bias[i]);
            }
            if !observed.is_empty() {
                debug!(
                    "Baseline epoch {}: training RMSE {:.5}",
                    epoch + 1,
                    (sum_sq_err / observed.len() as f64).sqrt()
                );
            }
        }

        info!(
            "Fitted SGD baseline on {} ratings ({} users, {} items) in {:?}",
            observed.len(),
            user_bias.len(),
            item_bias.len(),
            start_time.elapsed()
        );
        Ok(Self {
            global_mean,
            user_bias,
            item_bias,
        })
    }

    /// Baseline estimate for inner indices. An unknown side contributes no bias.
    pub fn predict(&self, inner_user: Option<usize>, inner_item: Option<usize>) -> f64 {
        let user_term = inner_user.and_then(|u| self.user_bias.get(u).copied()).unwrap_or(0.0);
        let item_term = inner_item.and_then(|i| self.item_bias.get(i).copied()).unwrap_or(0.0);
        self.global_mean + user_term + item_term
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }
}

impl BaselineBiases for SgdBaseline {
    fn user_bias(&self) -> ArrayView1<'_, f64> {
        self.user_bias.view()
    }

    fn item_bias(&self) -> ArrayView1<'_, f64> {
        self.item_bias.view()
    }
}
