//! Dual upper-bound engine.
//!
//! This module provides [`DualEngine`], which trains a [`DualNetwork`] to
//! produce a martingale `M_t = Σ h_s·dW_s` and reports the mean pathwise
//! maximum of `payoff - M` over the exercise grid on the test paths.
//!
//! The engine is lenient about dimensions: the increment time axis decides
//! the number of simulation steps, and any tensor that is longer is
//! truncated. Every adjustment is logged at `warn!`.

use stopping_core::math::{mean, SampleSummary};
use stopping_core::types::{clipped_grid_indices, Matrix, PathTensor, TensorError};
use stopping_models::{DualArchitecture, DualBatch, DualNetwork, LossKind, TrainableModel};
use tracing::{debug, info, warn};

use crate::config::DualConfig;
use crate::data::SampleSet;
use crate::error::EngineError;
use crate::result::UpperBound;

/// Martingale-duality upper-bound engine.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::{Matrix, PathTensor};
/// use stopping_models::config::NetworkConfig;
/// use stopping_pricing::config::{DualConfig, TrainingConfig};
/// use stopping_pricing::{DualEngine, SampleSet};
///
/// let config = DualConfig::builder()
///     .n_exercise(2)
///     .n_steps(4)
///     .fit_paths(6)
///     .network(NetworkConfig { layers: 1, nodes: 3, ..NetworkConfig::default() })
///     .training(TrainingConfig { epochs: 2, ..TrainingConfig::default() })
///     .build()
///     .unwrap();
/// let set = SampleSet::new(
///     PathTensor::zeros(8, 5, 1),
///     Matrix::filled(8, 5, 1.0),
///     Some(Matrix::zeros(8, 4)),
/// )
/// .unwrap();
///
/// let bound = DualEngine::new(config).price(&set, &set).unwrap();
/// assert_eq!(bound.n_steps_used, 4);
/// assert!((bound.price() - 1.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct DualEngine {
    config: DualConfig,
}

impl DualEngine {
    /// Creates an engine from a validated configuration.
    pub fn new(config: DualConfig) -> Self {
        Self { config }
    }

    /// Engine configuration.
    #[inline]
    pub fn config(&self) -> &DualConfig {
        &self.config
    }

    /// Trains the dual network on `train` and estimates the upper bound on
    /// `test`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if:
    /// - either sample set lacks increments
    /// - `fit_paths` exceeds the number of training paths
    /// - the dual architecture cannot be built (fewer than one usable step,
    ///   zero feature dimension)
    /// - the test payoffs have no columns
    pub fn price(&self, train: &SampleSet, test: &SampleSet) -> Result<UpperBound, EngineError> {
        self.price_from(train, test, None)
    }

    /// As [`price`](Self::price), starting from the weights of an earlier
    /// network.
    ///
    /// # Errors
    ///
    /// As [`price`](Self::price); additionally fails if `initial` has a
    /// different architecture.
    pub fn price_warm(
        &self,
        train: &SampleSet,
        test: &SampleSet,
        initial: &DualNetwork,
    ) -> Result<UpperBound, EngineError> {
        self.price_from(train, test, Some(initial))
    }

    fn price_from(
        &self,
        train: &SampleSet,
        test: &SampleSet,
        initial: Option<&DualNetwork>,
    ) -> Result<UpperBound, EngineError> {
        let config = &self.config;
        let train_increments = train.require_increments("training")?;
        let test_increments = test.require_increments("test")?;
        let m = train.n_paths();
        let fit_paths = config.fit_paths();
        if fit_paths > m {
            return Err(EngineError::InsufficientPaths {
                needed: fit_paths,
                got: m,
                purpose: "dual fitting",
            });
        }

        let n_steps = usable_steps(config.n_steps(), train, train_increments);
        let features = truncate_times(&train.features, n_steps)?;
        let payoffs = train.payoffs.truncate_cols(n_steps);
        let increments = train_increments.truncate_cols(n_steps);

        let architecture = DualArchitecture::from_config(
            config.n_exercise() + 1,
            n_steps + 1,
            features.n_features(),
            config.network(),
        );
        let mut network = DualNetwork::new(architecture, config.seed())?;
        if let Some(initial) = initial {
            network = network.with_initial_weights(initial)?;
        }
        let training = config.training();
        if training.loss != LossKind::DualMaxGap {
            debug!(loss = training.loss.name(), "Dual engine always trains on the dual loss");
        }
        network.compile(training.learning_rate, LossKind::DualMaxGap);

        let fit_features = features.select_paths(0..fit_paths);
        let fit_payoffs = payoffs.select_rows(0..fit_paths);
        let fit_increments = increments.select_rows(0..fit_paths);
        let batch = DualBatch::new(&fit_features, &fit_payoffs, &fit_increments)?;

        let val_features = features.select_paths(fit_paths..m);
        let val_payoffs = payoffs.select_rows(fit_paths..m);
        let val_increments = increments.select_rows(fit_paths..m);
        let validation = if fit_paths < m {
            Some(DualBatch::new(&val_features, &val_payoffs, &val_increments)?)
        } else {
            warn!(fit_paths, "No validation paths; early stopping monitors the training loss");
            None
        };

        info!(
            fit_paths,
            validation_paths = m - fit_paths,
            n_steps,
            parameters = network.parameter_count(),
            "Training dual network"
        );
        let history = network.fit(&batch, validation.as_ref(), &training.fit_options(training.epochs));

        let (estimate, indices) = test_maxima(&network, test, test_increments, n_steps, config.n_exercise())?;
        let y0 = mean(&network.predict_loss(
            &test.features,
            &test.payoffs.truncate_cols(n_steps),
            test_increments,
        ));
        info!(
            price = estimate.mean,
            std_dev = estimate.std_dev,
            y0,
            paths = estimate.n,
            "Upper bound"
        );

        Ok(UpperBound {
            y0,
            estimate,
            network,
            indices,
            n_steps_used: n_steps,
            history,
        })
    }
}

/// Number of simulation steps the engine works with: the increment width,
/// clipped to what the features and payoffs can support.
fn usable_steps(configured: usize, train: &SampleSet, increments: &Matrix) -> usize {
    let n_actual = increments.cols();
    if n_actual != configured {
        warn!(
            configured,
            increments = n_actual,
            "Configured steps differ from increments; using increments"
        );
    }
    let mut steps = n_actual;
    let feature_steps = train.features.n_steps();
    if feature_steps < steps {
        warn!(feature_steps, steps, "Features shorter than increments; clipping steps");
        steps = feature_steps;
    }
    if train.payoffs.cols() < steps {
        warn!(
            payoff_steps = train.payoffs.cols(),
            steps, "Payoffs shorter than increments; clipping steps"
        );
        steps = train.payoffs.cols();
    }
    steps
}

/// First `n_steps + 1` time points of `features`.
fn truncate_times(features: &PathTensor, n_steps: usize) -> Result<PathTensor, TensorError> {
    if features.n_times() <= n_steps + 1 {
        return Ok(features.clone());
    }
    debug!(
        times = features.n_times(),
        keep = n_steps + 1,
        "Truncating feature time axis"
    );
    let times: Vec<usize> = (0..=n_steps).collect();
    features.select_times(&times)
}

/// Pathwise maximum of `payoff - rule` over the clipped exercise grid, with
/// the rule starting at zero at time zero.
fn test_maxima(
    network: &DualNetwork,
    test: &SampleSet,
    increments: &Matrix,
    n_steps: usize,
    n_exercise: usize,
) -> Result<(SampleSummary, Vec<usize>), EngineError> {
    let mut rule = network.predict(&test.features, increments);
    if rule.cols() > n_steps {
        rule = rule.truncate_cols(n_steps);
    }
    let rule = rule.prepend_column(0.0);
    let payoffs = &test.payoffs;

    let grid = clipped_grid_indices(n_steps, n_exercise);
    let indices: Vec<usize> = grid
        .iter()
        .copied()
        .filter(|&i| i < rule.cols() && i < payoffs.cols())
        .collect();
    if indices.len() < grid.len() {
        warn!(
            dropped = grid.len() - indices.len(),
            rule_steps = rule.cols(),
            payoff_steps = payoffs.cols(),
            "Grid indices beyond test tensors dropped"
        );
    }
    if indices.is_empty() {
        return Err(TensorError::IndexOutOfRange {
            axis: "payoff time",
            index: 0,
            len: payoffs.cols(),
        }
        .into());
    }

    let maxima: Vec<f64> = (0..test.n_paths())
        .map(|p| {
            indices
                .iter()
                .map(|&i| payoffs.get(p, i) - rule.get(p, i))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect();
    Ok((SampleSummary::from_values(&maxima), indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use approx::assert_relative_eq;
    use stopping_models::config::NetworkConfig;

    fn config(n_exercise: usize, n_steps: usize, fit_paths: usize) -> DualConfig {
        DualConfig::builder()
            .n_exercise(n_exercise)
            .n_steps(n_steps)
            .fit_paths(fit_paths)
            .network(NetworkConfig {
                layers: 1,
                nodes: 3,
                ..NetworkConfig::default()
            })
            .training(TrainingConfig {
                epochs: 2,
                batch_size: 4,
                ..TrainingConfig::default()
            })
            .build()
            .unwrap()
    }

    fn ramp_set(paths: usize, steps: usize, increments: usize) -> SampleSet {
        let rows: Vec<Vec<f64>> = (0..paths)
            .map(|_| (0..=steps).map(|t| t as f64).collect())
            .collect();
        SampleSet::new(
            PathTensor::zeros(paths, steps + 1, 2),
            Matrix::from_rows(&rows).unwrap(),
            Some(Matrix::zeros(paths, increments)),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_increments_give_max_payoff() {
        let set = ramp_set(10, 4, 4);
        let bound = DualEngine::new(config(2, 4, 8)).price(&set, &set).unwrap();
        // Rule is identically zero; the grid is [0, 2, 4]
        assert_eq!(bound.indices, vec![0, 2, 4]);
        assert_relative_eq!(bound.price(), 4.0);
        assert_eq!(bound.estimate.std_dev, 0.0);
    }

    #[test]
    fn test_increments_decide_steps() {
        let set = ramp_set(10, 6, 4);
        let bound = DualEngine::new(config(2, 6, 8)).price(&set, &set).unwrap();
        assert_eq!(bound.n_steps_used, 4);
        assert_eq!(bound.network.architecture().n_times, 5);
        assert!(bound.indices.iter().all(|&i| i <= 4));
    }

    #[test]
    fn test_fit_paths_bounds() {
        let set = ramp_set(5, 4, 4);
        let result = DualEngine::new(config(2, 4, 6)).price(&set, &set);
        assert!(matches!(
            result,
            Err(EngineError::InsufficientPaths {
                needed: 6,
                got: 5,
                ..
            })
        ));
        // Using every path for fitting is allowed
        assert!(DualEngine::new(config(2, 4, 5)).price(&set, &set).is_ok());
    }

    #[test]
    fn test_missing_increments() {
        let set = SampleSet::new(PathTensor::zeros(4, 3, 1), Matrix::zeros(4, 3), None).unwrap();
        let result = DualEngine::new(config(2, 2, 2)).price(&set, &set);
        assert!(matches!(result, Err(EngineError::MissingIncrements("training"))));
    }

    #[test]
    fn test_warm_start_requires_matching_architecture() {
        let set = ramp_set(10, 4, 4);
        let engine = DualEngine::new(config(2, 4, 8));
        let first = engine.price(&set, &set).unwrap();
        assert!(engine.price_warm(&set, &set, &first.network).is_ok());

        let wider = NetworkConfig {
            layers: 1,
            nodes: 5,
            ..NetworkConfig::default()
        };
        let other = DualNetwork::new(DualArchitecture::from_config(3, 5, 2, &wider), 1).unwrap();
        assert!(matches!(
            engine.price_warm(&set, &set, &other),
            Err(EngineError::Model(_))
        ));
    }
}
