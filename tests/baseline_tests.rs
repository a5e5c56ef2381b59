// In tests/baseline_tests.rs

use efficient_knn::{BaselineBiases, BaselineConfig, KnnError, RatingDataAccessor, SgdBaseline, TrainSet};
use float_cmp::assert_approx_eq;

/// User 1 rates everything high, user 2 everything low; item 100 is liked by both.
fn biased_train_set() -> TrainSet {
    let mut triples = Vec::new();
    for item in 100..110u64 {
        let item_shift = if item == 100 { 1.0 } else { 0.0 };
        triples.push((1, item, 4.0 + item_shift));
        triples.push((2, item, 1.5 + item_shift));
        triples.push((3, item, 3.0 + item_shift));
    }
    TrainSet::from_triples(&triples).unwrap()
}

fn rmse<F: Fn(usize, usize) -> f64>(data: &TrainSet, predict: F) -> f64 {
    let (sum_sq, count) = data
        .user_ratings()
        .indexed_iter()
        .filter_map(|((u, i), r)| r.map(|r| (r - predict(u, i)).powi(2)))
        .fold((0.0, 0usize), |(sum, count), sq| (sum + sq, count + 1));
    (sum_sq / count as f64).sqrt()
}

#[test]
fn test_default_baseline_config() {
    let config = BaselineConfig::default();
    assert_approx_eq!(f64, config.reg, 0.02);
    assert_approx_eq!(f64, config.learning_rate, 0.005);
    assert_eq!(config.n_epochs, 20);
}

#[test]
fn test_baseline_reduces_training_error() {
    let data = biased_train_set();
    let config = BaselineConfig {
        learning_rate: 0.05,
        n_epochs: 50,
        ..BaselineConfig::default()
    };
    let baseline = SgdBaseline::fit(&data, &config).unwrap();

    let global_mean = data.global_mean();
    let mean_rmse = rmse(&data, |_, _| global_mean);
    let baseline_rmse = rmse(&data, |u, i| baseline.predict(Some(u), Some(i)));
    assert!(
        baseline_rmse < 0.5 * mean_rmse,
        "baseline RMSE {} should be well below global-mean RMSE {}",
        baseline_rmse,
        mean_rmse
    );

    // The generous user gets a positive bias, the harsh one a negative bias.
    let user_bias = baseline.user_bias();
    assert!(user_bias[0] > 0.0);
    assert!(user_bias[1] < 0.0);
    let item_bias = baseline.item_bias();
    assert_eq!(item_bias.len(), data.num_items());
    assert!(item_bias[0] > item_bias[1]);
}

#[test]
fn test_baseline_is_deterministic_for_a_seed() {
    let data = biased_train_set();
    let config = BaselineConfig::default();
    let first = SgdBaseline::fit(&data, &config).unwrap();
    let second = SgdBaseline::fit(&data, &config).unwrap();
    assert_eq!(first.user_bias(), second.user_bias());
    assert_eq!(first.item_bias(), second.item_bias());
}

#[test]
fn test_unknown_side_contributes_no_bias() {
    let data = biased_train_set();
    let baseline = SgdBaseline::fit(&data, &BaselineConfig::default()).unwrap();
    assert_eq!(baseline.predict(None, None), baseline.global_mean());
    assert_eq!(
        baseline.predict(Some(0), None),
        baseline.global_mean() + baseline.user_bias()[0]
    );
    assert_eq!(baseline.predict(Some(99), Some(99)), baseline.global_mean());
}

#[test]
fn test_invalid_baseline_config() {
    let data = biased_train_set();
    let bad_rate = BaselineConfig {
        learning_rate: 0.0,
        ..BaselineConfig::default()
    };
    assert!(matches!(SgdBaseline::fit(&data, &bad_rate), Err(KnnError::InvalidConfig(_))));
    let bad_reg = BaselineConfig {
        reg: f64::NAN,
        ..BaselineConfig::default()
    };
    assert!(matches!(SgdBaseline::fit(&data, &bad_reg), Err(KnnError::InvalidConfig(_))));
}
