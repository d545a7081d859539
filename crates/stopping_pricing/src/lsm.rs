//! Longstaff–Schwartz lower-bound engine.
//!
//! This module provides [`LongstaffSchwartzEngine`], which learns a stopping
//! rule by backward induction over the exercise dates and evaluates it on an
//! independent set of test paths.
//!
//! # Overview
//!
//! For `k = N1-1 … 1` the engine:
//! 1. Discounts the running path values by one date
//! 2. Regresses them on the features at date `k-1` (every path in Standard
//!    mode, in-the-money paths in AmericanOption mode)
//! 3. Replaces the value by the immediate payoff wherever the predicted
//!    continuation does not exceed it
//!
//! Each regressor is warm-started from the one trained for the following
//! date. In Standard mode a successful warm start cuts the epoch budget to a
//! single epoch.
//!
//! The test-time rule stops each path at the first date whose predicted
//! continuation is at most the payoff. The lower bound is the mean realised
//! payoff discounted by `d^i`, with `d = exp(-r·T/(N1+1))`.

use stopping_core::math::{discount_factor_per_date, discount_powers, SampleSummary};
use stopping_core::types::{ConfigError, ExerciseGrid, Matrix, PathTensor, TensorError};
use stopping_models::{Regressor, RegressorArchitecture, TrainableModel};
use tracing::{debug, info, warn};

use crate::config::{ExerciseMode, LsmConfig};
use crate::data::SampleSet;
use crate::error::EngineError;
use crate::result::{DateReport, LowerBound};

/// Regression-based lower-bound engine.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::{Matrix, PathTensor};
/// use stopping_models::config::NetworkConfig;
/// use stopping_pricing::config::{LsmConfig, TrainingConfig};
/// use stopping_pricing::{LongstaffSchwartzEngine, SampleSet};
///
/// let config = LsmConfig::builder()
///     .n_exercise(2)
///     .horizon(1.0)
///     .rate(0.0)
///     .network(NetworkConfig { layers: 1, nodes: 4, ..NetworkConfig::default() })
///     .training(TrainingConfig { epochs: 2, ..TrainingConfig::default() })
///     .build()
///     .unwrap();
/// let set = SampleSet::new(PathTensor::zeros(8, 3, 1), Matrix::filled(8, 3, 1.0), None).unwrap();
///
/// let bound = LongstaffSchwartzEngine::new(config).price(&set, &set).unwrap();
/// assert_eq!(bound.regressors.len(), 1);
/// assert!((bound.price() - 1.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct LongstaffSchwartzEngine {
    config: LsmConfig,
}

/// Trained stopping rule before evaluation.
struct FittedRule {
    grid: ExerciseGrid,
    regressors: Vec<Option<Regressor>>,
    reports: Vec<DateReport>,
}

impl LongstaffSchwartzEngine {
    /// Creates an engine from a validated configuration.
    pub fn new(config: LsmConfig) -> Self {
        Self { config }
    }

    /// Engine configuration.
    #[inline]
    pub fn config(&self) -> &LsmConfig {
        &self.config
    }

    /// Trains the stopping rule on `train` and evaluates it on `test`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if:
    /// - the training set is empty or `validation_paths >= M`
    /// - the exercise grid cannot be placed on the feature time axis
    /// - the test features disagree with the training features
    /// - a payoff matrix has no columns
    pub fn price(&self, train: &SampleSet, test: &SampleSet) -> Result<LowerBound, EngineError> {
        let fitted = self.fit_rule(train)?;
        let estimate = self.evaluate_on_grid(&fitted.grid, &fitted.regressors, test)?;
        info!(
            price = estimate.mean,
            std_dev = estimate.std_dev,
            paths = estimate.n,
            "Lower bound"
        );
        Ok(LowerBound {
            estimate,
            regressors: fitted.regressors,
            reports: fitted.reports,
        })
    }

    /// Evaluates previously trained regressors on `test`.
    ///
    /// `regressors` holds one entry per date `0..N1-1`; `None` entries never
    /// trigger exercise.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the grid cannot be placed on the test
    /// features, the payoff matrix is empty, or the number of regressors is
    /// not `N1 - 1`.
    pub fn evaluate(
        &self,
        regressors: &[Option<Regressor>],
        test: &SampleSet,
    ) -> Result<SampleSummary, EngineError> {
        let grid = ExerciseGrid::new(test.n_steps(), self.config.n_exercise())?;
        self.evaluate_on_grid(&grid, regressors, test)
    }

    fn fit_rule(&self, train: &SampleSet) -> Result<FittedRule, EngineError> {
        let config = &self.config;
        let n1 = config.n_exercise();
        let m = train.n_paths();
        if m == 0 {
            return Err(EngineError::InsufficientPaths {
                needed: 1,
                got: 0,
                purpose: "training",
            });
        }
        let m_val = config.validation_paths();
        if m_val >= m {
            return Err(ConfigError::invalid(
                "validation_paths",
                format!("must be less than the number of training paths ({m}), got {m_val}"),
            )
            .into());
        }

        let grid = ExerciseGrid::new(train.n_steps(), n1)?;
        let features = train.features.select_times(grid.exercise_indices())?;
        let payoffs = exercise_payoffs(&train.payoffs, grid.exercise_indices())?;
        let d = discount_factor_per_date(config.rate(), config.horizon(), n1);
        let feature_dim = features.n_features();
        let architecture = RegressorArchitecture::from_config(feature_dim, config.network());
        let training = config.training();

        debug!(
            paths = m,
            n_steps = grid.n_steps(),
            n_exercise = n1,
            feature_dim,
            mode = %config.mode(),
            "Starting backward induction"
        );

        let mut value = payoffs.column(n1 - 1);
        let mut regressors: Vec<Option<Regressor>> = (0..n1 - 1).map(|_| None).collect();
        let mut reports = Vec::with_capacity(n1.saturating_sub(1));

        for k in (1..n1).rev() {
            let date = k - 1;
            value.iter_mut().for_each(|v| *v *= d);
            let x = features.time_slice(date)?;
            let payoff_now = payoffs.column(date);

            let rows: Vec<usize> = match config.mode() {
                ExerciseMode::Standard => (0..m).collect(),
                ExerciseMode::AmericanOption => {
                    (0..m).filter(|&i| payoff_now[i] > 0.0).collect()
                }
            };
            if config.mode() == ExerciseMode::AmericanOption && rows.len() < 2 {
                info!(date, in_the_money = rows.len(), "Skipping date: too few in-the-money paths");
                reports.push(DateReport {
                    date,
                    skipped: true,
                    ..DateReport::default()
                });
                continue;
            }

            let mut regressor = Regressor::new(architecture.clone(), config.seed().wrapping_add(k as u64))?;
            let warm_started = match regressors.get(k).and_then(Option::as_ref) {
                Some(next) => match regressor.transfer_weights(next) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(date, error = %e, "Weight transfer failed; using fresh initialisation");
                        false
                    }
                },
                None => false,
            };
            let epochs = if warm_started && config.mode() == ExerciseMode::Standard {
                1
            } else {
                training.epochs
            };
            regressor.compile(training.learning_rate, training.loss);

            let (history, paths_used) = match config.mode() {
                ExerciseMode::Standard => {
                    let split = m - m_val;
                    let fit_x = x.select_rows(0..split);
                    let validation_x = x.select_rows(split..m);
                    let validation_y = &value[split..];
                    let validation = (m_val > 0).then_some((&validation_x, validation_y));
                    let history = regressor.fit(
                        &fit_x,
                        &value[..split],
                        validation,
                        &training.fit_options(epochs),
                    );
                    (history, split)
                }
                ExerciseMode::AmericanOption => {
                    let fit_x = x.gather_rows(&rows)?;
                    let targets: Vec<f64> = rows.iter().map(|&i| value[i]).collect();
                    let history = regressor.fit(&fit_x, &targets, None, &training.fit_options(epochs));
                    (history, rows.len())
                }
            };

            let predictions = regressor.predict(&x.gather_rows(&rows)?);
            let mut exercised = 0usize;
            for (&i, &continuation) in rows.iter().zip(&predictions) {
                if continuation <= payoff_now[i] {
                    value[i] = payoff_now[i];
                    exercised += 1;
                }
            }

            info!(
                date,
                paths = paths_used,
                warm_started,
                epochs,
                exercised,
                "Fitted continuation regressor"
            );
            reports.push(DateReport {
                date,
                paths_used,
                warm_started,
                epochs_budgeted: epochs,
                skipped: false,
                history,
            });
            regressors[date] = Some(regressor);
        }

        Ok(FittedRule {
            grid,
            regressors,
            reports,
        })
    }

    fn evaluate_on_grid(
        &self,
        grid: &ExerciseGrid,
        regressors: &[Option<Regressor>],
        test: &SampleSet,
    ) -> Result<SampleSummary, EngineError> {
        let n1 = grid.n_exercise();
        if regressors.len() != n1 - 1 {
            return Err(TensorError::ShapeMismatch {
                axis: "exercise date",
                left: regressors.len(),
                right: n1 - 1,
            }
            .into());
        }
        if let Some(regressor) = regressors.iter().flatten().next() {
            let expected = regressor.architecture().feature_dim;
            if test.features.n_features() != expected {
                return Err(TensorError::ShapeMismatch {
                    axis: "feature",
                    left: test.features.n_features(),
                    right: expected,
                }
                .into());
            }
        }
        let features = test.features.select_times(grid.exercise_indices())?;
        let payoffs = exercise_payoffs(&test.payoffs, grid.exercise_indices())?;
        let continuation = continuation_values(&features, regressors)?;
        let discounts = discount_powers(
            discount_factor_per_date(self.config.rate(), self.config.horizon(), n1),
            n1,
        );
        let american = self.config.mode() == ExerciseMode::AmericanOption;

        let realised: Vec<f64> = (0..test.n_paths())
            .map(|p| {
                let row = payoffs.row(p);
                let stop = (0..n1 - 1)
                    .find(|&i| {
                        let payoff = row[i];
                        (!american || payoff > 0.0) && continuation.get(p, i) <= payoff
                    })
                    .unwrap_or(n1 - 1);
                row[stop] * discounts[stop]
            })
            .collect();
        Ok(SampleSummary::from_values(&realised))
    }
}

/// Predicted continuation per path and date `0..N1-1`; skipped dates never
/// trigger exercise.
fn continuation_values(
    features: &PathTensor,
    regressors: &[Option<Regressor>],
) -> Result<Matrix, EngineError> {
    let paths = features.n_paths();
    let mut continuation = Matrix::filled(paths, regressors.len(), f64::INFINITY);
    for (date, regressor) in regressors.iter().enumerate() {
        let Some(regressor) = regressor else {
            continue;
        };
        let predictions = regressor.predict(&features.time_slice(date)?);
        for (p, value) in predictions.into_iter().enumerate() {
            continuation.set(p, date, value);
        }
    }
    Ok(continuation)
}

/// Payoff columns at the exercise dates. Indices past the payoff time axis
/// are clipped to its last column.
fn exercise_payoffs(payoffs: &Matrix, indices: &[usize]) -> Result<Matrix, EngineError> {
    let cols = payoffs.cols();
    if cols == 0 {
        return Err(TensorError::IndexOutOfRange {
            axis: "payoff time",
            index: indices.last().copied().unwrap_or(0),
            len: 0,
        }
        .into());
    }
    let clipped: Vec<usize> = indices.iter().map(|&i| i.min(cols - 1)).collect();
    if clipped.as_slice() != indices {
        warn!(
            payoff_steps = cols,
            last_index = indices.last().copied().unwrap_or(0),
            "Exercise indices exceed payoff time axis; clipping to last column"
        );
    }
    Ok(payoffs.select_columns(&clipped)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use approx::assert_relative_eq;
    use stopping_models::config::NetworkConfig;

    fn small_network() -> NetworkConfig {
        NetworkConfig {
            layers: 1,
            nodes: 4,
            ..NetworkConfig::default()
        }
    }

    fn config(n_exercise: usize, rate: f64, mode: ExerciseMode, epochs: usize) -> LsmConfig {
        LsmConfig::builder()
            .n_exercise(n_exercise)
            .horizon(1.0)
            .rate(rate)
            .mode(mode)
            .network(small_network())
            .training(TrainingConfig {
                epochs,
                batch_size: 8,
                ..TrainingConfig::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_exercise_payoffs_clip() {
        let payoffs = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        let sliced = exercise_payoffs(&payoffs, &[1, 2, 3]).unwrap();
        assert_eq!(sliced.row(0), &[2.0, 3.0, 3.0]);
        assert!(exercise_payoffs(&Matrix::zeros(1, 0), &[1]).is_err());
    }

    #[test]
    fn test_skipped_dates_never_exercise() {
        let features = PathTensor::zeros(3, 2, 1);
        let continuation = continuation_values(&features, &[None, None]).unwrap();
        assert!(continuation.as_slice().iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_american_final_date_payoff_is_exact() {
        // Payoff only at the final date: no in-the-money path before it
        let n1 = 4;
        let mut payoffs = Matrix::zeros(6, 5);
        for p in 0..6 {
            payoffs.set(p, 4, 1.0);
        }
        let set = SampleSet::new(PathTensor::zeros(6, 5, 2), payoffs, None).unwrap();
        let engine = LongstaffSchwartzEngine::new(config(n1, 0.3, ExerciseMode::AmericanOption, 3));

        let bound = engine.price(&set, &set).unwrap();
        assert!(bound.regressors.iter().all(Option::is_none));
        assert_eq!(bound.skipped_dates(), n1 - 1);
        let d = discount_factor_per_date(0.3, 1.0, n1);
        assert_relative_eq!(bound.price(), d.powi(n1 as i32 - 1), epsilon = 1e-14);
        assert_eq!(bound.estimate.std_dev, 0.0);
    }

    #[test]
    fn test_standard_warm_start_budget() {
        let set = SampleSet::new(
            PathTensor::zeros(16, 5, 1),
            Matrix::filled(16, 5, 1.0),
            None,
        )
        .unwrap();
        let engine = LongstaffSchwartzEngine::new(config(4, 0.05, ExerciseMode::Standard, 4));
        let bound = engine.price(&set, &set).unwrap();

        let budgets: Vec<usize> = bound.reports.iter().map(|r| r.epochs_budgeted).collect();
        assert_eq!(budgets, vec![4, 1, 1]);
        assert!(!bound.reports[0].warm_started);
        assert!(bound.reports[1..].iter().all(|r| r.warm_started));
        assert_eq!(bound.reports.iter().map(|r| r.date).collect::<Vec<_>>(), vec![2, 1, 0]);
    }

    #[test]
    fn test_validation_paths_must_leave_training_paths() {
        let set = SampleSet::new(PathTensor::zeros(4, 3, 1), Matrix::zeros(4, 3), None).unwrap();
        let config = LsmConfig::builder()
            .n_exercise(2)
            .horizon(1.0)
            .rate(0.0)
            .validation_paths(4)
            .build()
            .unwrap();
        let result = LongstaffSchwartzEngine::new(config).price(&set, &set);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_grid_error_propagates() {
        // Five exercise dates on two simulation steps
        let set = SampleSet::new(PathTensor::zeros(4, 3, 1), Matrix::zeros(4, 3), None).unwrap();
        let engine = LongstaffSchwartzEngine::new(config(5, 0.0, ExerciseMode::Standard, 1));
        assert!(matches!(engine.price(&set, &set), Err(EngineError::Grid(_))));
    }

    #[test]
    fn test_evaluate_checks_regressor_count() {
        let set = SampleSet::new(PathTensor::zeros(4, 5, 1), Matrix::zeros(4, 5), None).unwrap();
        let engine = LongstaffSchwartzEngine::new(config(4, 0.0, ExerciseMode::Standard, 1));
        assert!(engine.evaluate(&[None], &set).is_err());
        let summary = engine.evaluate(&[None, None, None], &set).unwrap();
        assert_eq!(summary.n, 4);
    }
}
