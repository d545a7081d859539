//! Integration tests for module exports and cross-module behaviour.

use approx::assert_relative_eq;
use stopping_core::math::{discount_factor_per_date, discount_powers, SampleSummary};
use stopping_core::types::{clipped_grid_indices, rule_indices, ExerciseGrid, Matrix, PathTensor};

/// Slicing features and payoffs on an exercise grid keeps paths aligned.
#[test]
fn test_grid_slicing_of_features_and_payoffs() {
    let paths = 3;
    let times = 9;
    let mut data = Vec::new();
    for p in 0..paths {
        for t in 0..times {
            data.push((10 * p + t) as f64);
        }
    }
    let features = PathTensor::new(paths, times, 1, data).unwrap();
    let payoffs = Matrix::new(
        paths,
        times,
        (0..paths * times).map(|i| i as f64).collect(),
    )
    .unwrap();

    let grid = ExerciseGrid::new(features.n_steps(), 4).unwrap();
    assert_eq!(grid.exercise_indices(), &[2, 4, 6, 8]);

    let sliced = features.select_times(grid.exercise_indices()).unwrap();
    let sliced_payoffs = payoffs.select_columns(grid.exercise_indices()).unwrap();
    assert_eq!(sliced.n_times(), 4);
    assert_eq!(sliced.get(2, 3, 0), 28.0);
    assert_eq!(sliced_payoffs.get(2, 3), 26.0);
}

/// Discounted constant payoffs summarise to the discount factor itself.
#[test]
fn test_discounted_summary() {
    let d = discount_factor_per_date(0.05, 1.0, 4);
    let powers = discount_powers(d, 4);
    let realised: Vec<f64> = powers.iter().map(|p| 2.0 * p).collect();
    let summary = SampleSummary::from_values(&realised[..1]);
    assert_relative_eq!(summary.mean, 2.0);
    assert_eq!(summary.std_dev, 0.0);
    assert_relative_eq!(powers[3], d.powi(3), epsilon = 1e-15);
}

/// The lenient dual grid agrees with the strict grid where both are defined.
#[test]
fn test_clipped_grid_matches_strict_grid() {
    for n_steps in 1..30 {
        for n_exercise in 1..=n_steps {
            let strict = ExerciseGrid::new(n_steps, n_exercise).unwrap();
            assert_eq!(clipped_grid_indices(n_steps, n_exercise), strict.indices());
        }
    }
}

#[test]
fn test_rule_indices_over_resolved() {
    assert_eq!(rule_indices(5, 3), vec![0, 1, 2, 2, 2]);
}
