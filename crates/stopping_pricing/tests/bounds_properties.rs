//! Integration tests for the lower- and upper-bound engines.
//!
//! These tests check properties that hold independently of how well the
//! networks train: exact values where the stopping rule is forced, the
//! ordering of the bounds, and recovery from degraded models.

use approx::assert_relative_eq;
use proptest::prelude::*;
use stopping_core::math::discount_factor_per_date;
use stopping_core::types::{Matrix, PathTensor};
use stopping_models::config::NetworkConfig;
use stopping_models::TrainableModel;
use stopping_pricing::{
    DualConfig, DualEngine, EngineError, ExerciseMode, LongstaffSchwartzEngine, LsmConfig,
    SampleSet, TrainingConfig,
};

fn small_network() -> NetworkConfig {
    NetworkConfig::builder().layers(2).nodes(6).build().unwrap()
}

fn training(epochs: usize) -> TrainingConfig {
    TrainingConfig {
        epochs,
        batch_size: 8,
        ..TrainingConfig::default()
    }
}

fn lsm_config(n_exercise: usize, rate: f64, mode: ExerciseMode, epochs: usize) -> LsmConfig {
    LsmConfig::builder()
        .n_exercise(n_exercise)
        .horizon(1.0)
        .rate(rate)
        .mode(mode)
        .network(small_network())
        .training(training(epochs))
        .build()
        .unwrap()
}

/// Deterministic non-negative payoffs on `steps + 1` time points.
fn toy_payoffs(paths: usize, steps: usize) -> Matrix {
    let rows: Vec<Vec<f64>> = (0..paths)
        .map(|p| {
            (0..=steps)
                .map(|t| ((p * 7 + t * 3) % 5) as f64 * 0.25)
                .collect()
        })
        .collect();
    Matrix::from_rows(&rows).unwrap()
}

/// Features varying along paths and time, `paths × (steps + 1) × 2`.
fn toy_features(paths: usize, steps: usize) -> PathTensor {
    let nested: Vec<Vec<Vec<f64>>> = (0..paths)
        .map(|p| {
            (0..=steps)
                .map(|t| vec![t as f64 / steps as f64, (p % 4) as f64 * 0.1])
                .collect()
        })
        .collect();
    PathTensor::from_nested(&nested).unwrap()
}

/// A constant payoff of one is exercised at the first date.
#[test]
fn test_constant_payoff_lower_bound_is_one() {
    let set = SampleSet::new(PathTensor::zeros(24, 4, 2), Matrix::filled(24, 4, 1.0), None).unwrap();
    let engine = LongstaffSchwartzEngine::new(lsm_config(3, 0.5, ExerciseMode::Standard, 20));

    let bound = engine.price(&set, &set).unwrap();

    assert_relative_eq!(bound.price(), 1.0, epsilon = 1e-12);
    assert_eq!(bound.estimate.n, 24);
    assert_eq!(bound.regressors.len(), 2);
    assert!(bound.regressors.iter().all(Option::is_some));
}

/// Warm starts cut every later date to a single epoch in Standard mode,
/// including when a validation tail is held out.
#[test]
fn test_standard_warm_start_with_validation_tail() {
    let set = SampleSet::new(toy_features(20, 6), toy_payoffs(20, 6), None).unwrap();
    let config = LsmConfig::builder()
        .n_exercise(6)
        .horizon(2.0)
        .rate(0.03)
        .network(small_network())
        .training(training(3))
        .validation_paths(5)
        .build()
        .unwrap();

    let bound = LongstaffSchwartzEngine::new(config).price(&set, &set).unwrap();

    assert_eq!(bound.reports.len(), 5);
    assert_eq!(bound.reports[0].epochs_budgeted, 3);
    for report in &bound.reports[1..] {
        assert!(report.warm_started);
        assert_eq!(report.epochs_budgeted, 1);
    }
    assert!(bound.reports.iter().all(|r| r.paths_used == 15));
    let history = bound.reports[0].history.as_ref().unwrap();
    assert!(history.epochs.iter().all(|e| e.val_loss.is_some()));
}

/// American mode keeps the full budget after a warm start.
#[test]
fn test_american_warm_start_keeps_budget() {
    let set = SampleSet::new(
        PathTensor::zeros(12, 4, 1),
        Matrix::filled(12, 4, 2.0),
        None,
    )
    .unwrap();
    let engine = LongstaffSchwartzEngine::new(lsm_config(3, 0.0, ExerciseMode::AmericanOption, 2));

    let bound = engine.price(&set, &set).unwrap();

    assert_eq!(bound.reports[1].epochs_budgeted, 2);
    assert!(bound.reports[1].warm_started);
    assert_relative_eq!(bound.price(), 2.0, epsilon = 1e-12);
}

/// Only one in-the-money path at a date skips it; the rule never stops
/// there.
#[test]
fn test_american_single_itm_path_is_skipped() {
    let mut payoffs = Matrix::zeros(6, 3);
    payoffs.set(0, 1, 5.0);
    for p in 0..6 {
        payoffs.set(p, 2, 1.0);
    }
    let set = SampleSet::new(PathTensor::zeros(6, 3, 1), payoffs, None).unwrap();
    let engine = LongstaffSchwartzEngine::new(lsm_config(2, 0.0, ExerciseMode::AmericanOption, 2));

    let bound = engine.price(&set, &set).unwrap();

    assert!(bound.regressors[0].is_none());
    assert!(bound.reports[0].skipped);
    // Path 0 would have exercised 5.0 at date 0 had the date been kept
    assert_relative_eq!(bound.price(), 1.0, epsilon = 1e-12);
}

/// Degraded regressors predict zero continuation, so every positive payoff
/// is exercised at the first date.
#[test]
fn test_degraded_regressors_still_price() {
    let set = SampleSet::new(toy_features(10, 4), toy_payoffs(10, 4), None).unwrap();
    let config = LsmConfig::builder()
        .n_exercise(4)
        .horizon(1.0)
        .rate(0.0)
        .network(small_network())
        .training(TrainingConfig {
            learning_rate: -1.0,
            ..training(2)
        })
        .build()
        .unwrap();

    let bound = LongstaffSchwartzEngine::new(config).price(&set, &set).unwrap();

    assert!(bound
        .regressors
        .iter()
        .flatten()
        .all(|r| r.is_degraded()));
    assert!(bound.reports.iter().all(|r| r.history.is_none()));
    // First exercise date is time index 1
    let expected: f64 = (0..10).map(|p| toy_payoffs(10, 4).get(p, 1)).sum::<f64>() / 10.0;
    assert_relative_eq!(bound.price(), expected, epsilon = 1e-12);
}

/// With zero increments the martingale vanishes, so the dual estimate is
/// the pathwise maximum payoff, which dominates any stopping rule.
#[test]
fn test_upper_bound_dominates_lower_bound() {
    let (paths, steps) = (40, 4);
    let set = SampleSet::new(
        toy_features(paths, steps),
        toy_payoffs(paths, steps),
        Some(Matrix::zeros(paths, steps)),
    )
    .unwrap();

    let lower = LongstaffSchwartzEngine::new(lsm_config(2, 0.05, ExerciseMode::Standard, 5))
        .price(&set, &set)
        .unwrap();
    let dual = DualConfig::builder()
        .n_exercise(2)
        .n_steps(steps)
        .fit_paths(30)
        .network(small_network())
        .training(training(3))
        .build()
        .unwrap();
    let upper = DualEngine::new(dual).price(&set, &set).unwrap();

    assert_eq!(upper.indices, vec![0, 2, 4]);
    assert!(upper.price() >= lower.price());
    assert!(upper.y0.is_finite());
}

/// Deterministic non-zero increments, `paths × steps`.
fn wave_increments(paths: usize, steps: usize) -> Matrix {
    let rows: Vec<Vec<f64>> = (0..paths)
        .map(|p| {
            (0..steps)
                .map(|t| ((p * steps + t) as f64 * 0.9).sin() * 0.4)
                .collect()
        })
        .collect();
    Matrix::from_rows(&rows).unwrap()
}

/// Mean over paths of `max_{i in indices} (Y[p, i] - M[p, i])` with
/// `M[p, 0] = 0` and `M[p, i] = rule[p, i - 1]`.
fn hand_upper_bound(payoffs: &Matrix, rule: &Matrix, indices: &[usize]) -> f64 {
    let total: f64 = (0..payoffs.rows())
        .map(|p| {
            indices
                .iter()
                .map(|&i| {
                    let martingale = if i == 0 { 0.0 } else { rule.get(p, i - 1) };
                    payoffs.get(p, i) - martingale
                })
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .sum();
    total / payoffs.rows() as f64
}

fn dual_config(n_exercise: usize, steps: usize, fit_paths: usize) -> DualConfig {
    DualConfig::builder()
        .n_exercise(n_exercise)
        .n_steps(steps)
        .fit_paths(fit_paths)
        .network(small_network())
        .training(training(3))
        .build()
        .unwrap()
}

/// With non-zero increments the martingale starts at zero at time zero and
/// `M[i]` is the rule after `i` increments.
#[test]
fn test_upper_bound_aligns_martingale_with_payoffs() {
    let (paths, steps) = (6, 4);
    let set = SampleSet::new(
        toy_features(paths, steps),
        toy_payoffs(paths, steps),
        Some(wave_increments(paths, steps)),
    )
    .unwrap();

    let upper = DualEngine::new(dual_config(2, steps, 4)).price(&set, &set).unwrap();

    let rule = upper.network.predict(&set.features, set.increments.as_ref().unwrap());
    assert_eq!(rule.cols(), steps);
    assert!(rule.as_slice().iter().any(|v| v.abs() > 0.0));
    assert_eq!(upper.indices, vec![0, 2, 4]);
    let expected = hand_upper_bound(&set.payoffs, &rule, &upper.indices);
    assert_relative_eq!(upper.price(), expected, epsilon = 1e-12);
}

/// A test set longer than the training increments has its rule truncated to
/// the steps used in training.
#[test]
fn test_upper_bound_truncates_wider_test_rule() {
    let (paths, steps, test_steps) = (6, 4, 6);
    let train = SampleSet::new(
        toy_features(paths, steps),
        toy_payoffs(paths, steps),
        Some(wave_increments(paths, steps)),
    )
    .unwrap();
    let test_increments = wave_increments(paths, test_steps);
    let test = SampleSet::new(
        toy_features(paths, test_steps),
        toy_payoffs(paths, test_steps),
        Some(test_increments.clone()),
    )
    .unwrap();

    let upper = DualEngine::new(dual_config(2, steps, 4)).price(&train, &test).unwrap();

    assert_eq!(upper.n_steps_used, steps);
    let full_rule = upper.network.predict(&test.features, &test_increments);
    assert_eq!(full_rule.cols(), test_steps);
    let rule = full_rule.truncate_cols(steps);
    assert_eq!(upper.indices, vec![0, 2, 4]);
    let expected = hand_upper_bound(&test.payoffs, &rule, &upper.indices);
    assert_relative_eq!(upper.price(), expected, epsilon = 1e-12);
}

/// The dual engine requires increments on both sample sets.
#[test]
fn test_dual_rejects_missing_test_increments() {
    let train = SampleSet::new(
        toy_features(8, 2),
        toy_payoffs(8, 2),
        Some(Matrix::zeros(8, 2)),
    )
    .unwrap();
    let test = SampleSet::new(toy_features(8, 2), toy_payoffs(8, 2), None).unwrap();
    let config = DualConfig::builder()
        .n_exercise(2)
        .n_steps(2)
        .fit_paths(4)
        .build()
        .unwrap();

    let result = DualEngine::new(config).price(&train, &test);
    assert!(matches!(result, Err(EngineError::MissingIncrements("test"))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// A payoff paid only at the final date is worth exactly `d^(N1-1)`.
    #[test]
    fn test_final_date_payoff_is_discounted_exactly(rate in 0.0f64..0.5, n_exercise in 2usize..6) {
        let steps = n_exercise;
        let mut payoffs = Matrix::zeros(5, steps + 1);
        for p in 0..5 {
            payoffs.set(p, steps, 1.0);
        }
        let set = SampleSet::new(PathTensor::zeros(5, steps + 1, 1), payoffs, None).unwrap();
        let engine = LongstaffSchwartzEngine::new(
            lsm_config(n_exercise, rate, ExerciseMode::AmericanOption, 1),
        );

        let bound = engine.price(&set, &set).unwrap();

        let d = discount_factor_per_date(rate, 1.0, n_exercise);
        prop_assert!((bound.price() - d.powi(n_exercise as i32 - 1)).abs() < 1e-12);
        prop_assert_eq!(bound.skipped_dates(), n_exercise - 1);
    }
}
