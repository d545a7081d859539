//! Engine configuration.
//!
//! This module provides configuration types and builders for the
//! lower-bound ([`LsmConfig`]) and upper-bound ([`DualConfig`]) engines.
//! Builders validate at `build()`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stopping_core::types::ConfigError;
use stopping_models::config::NetworkConfig;
use stopping_models::training::{FitOptions, DEFAULT_PATIENCE};
use stopping_models::LossKind;

/// Default seed for model initialisation.
pub const DEFAULT_SEED: u64 = 42;

/// Default L2 coefficient for the dual trunk.
pub const DUAL_DEFAULT_REGULARIZER: f64 = 0.01;

/// How the lower-bound engine selects regression paths.
///
/// # Examples
///
/// ```rust
/// use stopping_pricing::config::ExerciseMode;
///
/// assert_eq!("American Option".parse::<ExerciseMode>().unwrap(), ExerciseMode::AmericanOption);
/// assert_eq!("standard".parse::<ExerciseMode>().unwrap(), ExerciseMode::Standard);
/// assert!("Bermudan".parse::<ExerciseMode>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseMode {
    /// Regress on every path; stop when continuation ≤ payoff
    #[default]
    Standard,
    /// Regress on in-the-money paths only; stop when the payoff is positive
    /// and continuation ≤ payoff
    AmericanOption,
}

impl fmt::Display for ExerciseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("Standard"),
            Self::AmericanOption => f.write_str("American Option"),
        }
    }
}

impl FromStr for ExerciseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Standard" | "standard" => Ok(Self::Standard),
            "American Option" | "AmericanOption" | "american" | "american_option" => {
                Ok(Self::AmericanOption)
            }
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

/// Optimisation hyperparameters shared by both engines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Mini-batch size
    pub batch_size: usize,
    /// Maximum epochs per fit
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Regression loss (the dual engine always uses the dual loss)
    pub loss: LossKind,
    /// Early-stopping patience
    pub patience: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 100,
            learning_rate: 1e-3,
            loss: LossKind::MeanSquaredError,
            patience: DEFAULT_PATIENCE,
        }
    }
}

impl TrainingConfig {
    /// Validates the hyperparameters.
    ///
    /// A non-positive learning rate is not rejected here: it degrades the
    /// models at compile time instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for a zero batch size or
    /// zero epochs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be positive"));
        }
        if self.epochs == 0 {
            return Err(ConfigError::invalid("epochs", "must be positive"));
        }
        Ok(())
    }

    /// Fit options with the given epoch budget.
    pub fn fit_options(&self, epochs: usize) -> FitOptions {
        FitOptions::new(self.batch_size, epochs).with_patience(self.patience)
    }
}

/// Lower-bound engine configuration.
///
/// # Examples
///
/// ```rust
/// use stopping_pricing::config::{ExerciseMode, LsmConfig};
///
/// let config = LsmConfig::builder()
///     .n_exercise(10)
///     .horizon(1.0)
///     .rate(0.05)
///     .mode(ExerciseMode::AmericanOption)
///     .build()
///     .unwrap();
/// assert_eq!(config.n_exercise(), 10);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LsmConfig {
    n_exercise: usize,
    horizon: f64,
    rate: f64,
    mode: ExerciseMode,
    network: NetworkConfig,
    training: TrainingConfig,
    validation_paths: usize,
    seed: u64,
}

impl LsmConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> LsmConfigBuilder {
        LsmConfigBuilder::default()
    }

    /// Number of exercise dates `N1`.
    #[inline]
    pub fn n_exercise(&self) -> usize {
        self.n_exercise
    }

    /// Time horizon `T`.
    #[inline]
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Risk-free rate `r`.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Exercise mode.
    #[inline]
    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    /// Regressor hyperparameters.
    #[inline]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Optimisation hyperparameters.
    #[inline]
    pub fn training(&self) -> &TrainingConfig {
        &self.training
    }

    /// Number of trailing training paths held out for validation
    /// (Standard mode only).
    #[inline]
    pub fn validation_paths(&self) -> usize {
        self.validation_paths
    }

    /// Base seed; the regressor for date `k` uses `seed + k`.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `n_exercise` is 0
    /// - `horizon` or `rate` is non-finite, or `horizon` is negative
    /// - the network or training section is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_exercise == 0 {
            return Err(ConfigError::invalid("n_exercise", "must be positive"));
        }
        if !self.horizon.is_finite() || self.horizon < 0.0 {
            return Err(ConfigError::invalid(
                "horizon",
                format!("must be finite and non-negative, got {}", self.horizon),
            ));
        }
        if !self.rate.is_finite() {
            return Err(ConfigError::invalid("rate", format!("must be finite, got {}", self.rate)));
        }
        self.network.validate()?;
        self.training.validate()
    }
}

/// Builder for [`LsmConfig`].
#[derive(Clone, Debug, Default)]
pub struct LsmConfigBuilder {
    n_exercise: Option<usize>,
    horizon: Option<f64>,
    rate: Option<f64>,
    mode: ExerciseMode,
    network: Option<NetworkConfig>,
    training: Option<TrainingConfig>,
    validation_paths: usize,
    seed: Option<u64>,
}

impl LsmConfigBuilder {
    /// Sets the number of exercise dates.
    #[inline]
    pub fn n_exercise(mut self, n_exercise: usize) -> Self {
        self.n_exercise = Some(n_exercise);
        self
    }

    /// Sets the time horizon.
    #[inline]
    pub fn horizon(mut self, horizon: f64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Sets the risk-free rate.
    #[inline]
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Sets the exercise mode.
    #[inline]
    pub fn mode(mut self, mode: ExerciseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the regressor hyperparameters.
    #[inline]
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the optimisation hyperparameters.
    #[inline]
    pub fn training(mut self, training: TrainingConfig) -> Self {
        self.training = Some(training);
        self
    }

    /// Sets the number of validation paths.
    #[inline]
    pub fn validation_paths(mut self, validation_paths: usize) -> Self {
        self.validation_paths = validation_paths;
        self
    }

    /// Sets the base seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `n_exercise`, `horizon` or `rate` is not
    /// set, or validation fails.
    pub fn build(self) -> Result<LsmConfig, ConfigError> {
        let n_exercise = self
            .n_exercise
            .ok_or(ConfigError::invalid("n_exercise", "must be specified"))?;
        let horizon = self
            .horizon
            .ok_or(ConfigError::invalid("horizon", "must be specified"))?;
        let rate = self
            .rate
            .ok_or(ConfigError::invalid("rate", "must be specified"))?;

        let config = LsmConfig {
            n_exercise,
            horizon,
            rate,
            mode: self.mode,
            network: self.network.unwrap_or_default(),
            training: self.training.unwrap_or_default(),
            validation_paths: self.validation_paths,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Upper-bound engine configuration.
///
/// # Examples
///
/// ```rust
/// use stopping_pricing::config::DualConfig;
///
/// let config = DualConfig::builder()
///     .n_exercise(4)
///     .n_steps(8)
///     .fit_paths(100)
///     .build()
///     .unwrap();
/// assert_eq!(config.network().regularizer, 0.01);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DualConfig {
    n_exercise: usize,
    n_steps: usize,
    network: NetworkConfig,
    training: TrainingConfig,
    fit_paths: usize,
    seed: u64,
}

impl DualConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> DualConfigBuilder {
        DualConfigBuilder::default()
    }

    /// Number of exercise dates `N1`.
    #[inline]
    pub fn n_exercise(&self) -> usize {
        self.n_exercise
    }

    /// Configured number of simulation steps `N`. The increments decide the
    /// number actually used.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Trunk hyperparameters.
    #[inline]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Optimisation hyperparameters.
    #[inline]
    pub fn training(&self) -> &TrainingConfig {
        &self.training
    }

    /// Number of leading training paths used for fitting; the rest
    /// validate.
    #[inline]
    pub fn fit_paths(&self) -> usize {
        self.fit_paths
    }

    /// Seed of the dual network.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `n_exercise`, `n_steps` or `fit_paths` is
    /// 0, or the network or training section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_exercise == 0 {
            return Err(ConfigError::invalid("n_exercise", "must be positive"));
        }
        if self.n_steps == 0 {
            return Err(ConfigError::invalid("n_steps", "must be positive"));
        }
        if self.fit_paths == 0 {
            return Err(ConfigError::invalid("fit_paths", "must be positive"));
        }
        if self.network.layers == 0 {
            return Err(ConfigError::invalid("layers", "dual trunk needs at least one layer"));
        }
        self.network.validate()?;
        self.training.validate()
    }
}

/// Builder for [`DualConfig`].
#[derive(Clone, Debug, Default)]
pub struct DualConfigBuilder {
    n_exercise: Option<usize>,
    n_steps: Option<usize>,
    network: Option<NetworkConfig>,
    training: Option<TrainingConfig>,
    fit_paths: Option<usize>,
    seed: Option<u64>,
}

impl DualConfigBuilder {
    /// Sets the number of exercise dates.
    #[inline]
    pub fn n_exercise(mut self, n_exercise: usize) -> Self {
        self.n_exercise = Some(n_exercise);
        self
    }

    /// Sets the configured number of simulation steps.
    #[inline]
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = Some(n_steps);
        self
    }

    /// Sets the trunk hyperparameters.
    #[inline]
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the optimisation hyperparameters.
    #[inline]
    pub fn training(mut self, training: TrainingConfig) -> Self {
        self.training = Some(training);
        self
    }

    /// Sets the number of fitting paths.
    #[inline]
    pub fn fit_paths(mut self, fit_paths: usize) -> Self {
        self.fit_paths = Some(fit_paths);
        self
    }

    /// Sets the seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configuration.
    ///
    /// The default trunk uses an L2 coefficient of
    /// [`DUAL_DEFAULT_REGULARIZER`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `n_exercise`, `n_steps` or `fit_paths` is
    /// not set, or validation fails.
    pub fn build(self) -> Result<DualConfig, ConfigError> {
        let n_exercise = self
            .n_exercise
            .ok_or(ConfigError::invalid("n_exercise", "must be specified"))?;
        let n_steps = self
            .n_steps
            .ok_or(ConfigError::invalid("n_steps", "must be specified"))?;
        let fit_paths = self
            .fit_paths
            .ok_or(ConfigError::invalid("fit_paths", "must be specified"))?;

        let config = DualConfig {
            n_exercise,
            n_steps,
            network: self.network.unwrap_or_else(|| NetworkConfig {
                regularizer: DUAL_DEFAULT_REGULARIZER,
                ..NetworkConfig::default()
            }),
            training: self.training.unwrap_or_default(),
            fit_paths,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        };
        config.validate()?;
        Ok(config)
    }
}
