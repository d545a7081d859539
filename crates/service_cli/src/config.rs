//! Run configuration management
//!
//! Handles loading configuration from TOML files, environment variables and
//! CLI arguments, and converts it into engine configurations.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use stopping_models::config::NetworkConfig;
use stopping_models::LossKind;
use stopping_pricing::config::{DUAL_DEFAULT_REGULARIZER, DEFAULT_SEED};
use stopping_pricing::{DualConfig, ExerciseMode, LsmConfig, TrainingConfig};
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error(transparent)]
    Parameter(#[from] stopping_core::types::ConfigError),
}

/// Log levels supported by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

fn deserialize_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let s = String::deserialize(deserializer)?;
    T::from_str(&s).map_err(serde::de::Error::custom)
}

/// `[problem]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProblemSection {
    /// Number of exercise dates N1
    pub n_exercise: usize,
    /// Time horizon T
    pub horizon: f64,
    /// Risk-free rate r
    pub rate: f64,
    /// Exercise mode ("Standard" or "American Option")
    #[serde(deserialize_with = "deserialize_from_str")]
    pub mode: ExerciseMode,
    /// Configured simulation steps; the data decide when absent
    pub n_steps: Option<usize>,
}

impl Default for ProblemSection {
    fn default() -> Self {
        Self {
            n_exercise: 10,
            horizon: 1.0,
            rate: 0.0,
            mode: ExerciseMode::Standard,
            n_steps: None,
        }
    }
}

/// `[training]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Regression loss ("mse", "mae", "huber")
    #[serde(deserialize_with = "deserialize_from_str")]
    pub loss: LossKind,
    pub patience: usize,
    /// Trailing training paths held out by the lower-bound engine
    pub validation_paths: usize,
    /// Leading training paths fitted by the dual engine; 80% when absent
    pub dual_fit_paths: Option<usize>,
    /// L2 coefficient of the dual trunk
    pub dual_regularizer: f64,
    pub seed: u64,
}

impl Default for TrainingSection {
    fn default() -> Self {
        let training = TrainingConfig::default();
        Self {
            batch_size: training.batch_size,
            epochs: training.epochs,
            learning_rate: training.learning_rate,
            loss: training.loss,
            patience: training.patience,
            validation_paths: 0,
            dual_fit_paths: None,
            dual_regularizer: DUAL_DEFAULT_REGULARIZER,
            seed: DEFAULT_SEED,
        }
    }
}

impl TrainingSection {
    fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            batch_size: self.batch_size,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            loss: self.loss,
            patience: self.patience,
        }
    }
}

/// Full run configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Log level
    #[serde(deserialize_with = "deserialize_from_str")]
    pub log_level: LogLevel,
    pub problem: ProblemSection,
    pub network: NetworkConfig,
    pub training: TrainingSection,
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))
    }

    /// Override with SIGSTOP_* environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override from an arbitrary variable lookup
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(level) = lookup("SIGSTOP_LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&level)?;
        }
        if let Some(epochs) = lookup("SIGSTOP_EPOCHS") {
            self.training.epochs = parse_value("SIGSTOP_EPOCHS", &epochs)?;
        }
        if let Some(seed) = lookup("SIGSTOP_SEED") {
            self.training.seed = parse_value("SIGSTOP_SEED", &seed)?;
        }
        Ok(())
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(log_level) = &cli.log_level {
            self.log_level = LogLevel::from_str(log_level)?;
        }
        if let Some(epochs) = cli.epochs {
            self.training.epochs = epochs;
        }
        if let Some(seed) = cli.seed {
            self.training.seed = seed;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.problem.n_exercise == 0 {
            return Err(ConfigError::InvalidValue {
                name: "problem.n_exercise",
                value: "must be positive".to_string(),
            });
        }
        if !self.training.dual_regularizer.is_finite() || self.training.dual_regularizer < 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "training.dual_regularizer",
                value: self.training.dual_regularizer.to_string(),
            });
        }
        self.network.validate()?;
        self.training.training_config().validate()?;
        Ok(())
    }

    /// Lower-bound engine configuration
    pub fn lsm_config(&self) -> Result<LsmConfig, ConfigError> {
        Ok(LsmConfig::builder()
            .n_exercise(self.problem.n_exercise)
            .horizon(self.problem.horizon)
            .rate(self.problem.rate)
            .mode(self.problem.mode)
            .network(self.network.clone())
            .training(self.training.training_config())
            .validation_paths(self.training.validation_paths)
            .seed(self.training.seed)
            .build()?)
    }

    /// Upper-bound engine configuration for `train_paths` training paths
    /// and `data_steps` increment columns
    pub fn dual_config(
        &self,
        train_paths: usize,
        data_steps: usize,
    ) -> Result<DualConfig, ConfigError> {
        let fit_paths = self
            .training
            .dual_fit_paths
            .unwrap_or_else(|| (train_paths * 4 / 5).max(1));
        let network = NetworkConfig {
            regularizer: self.training.dual_regularizer,
            ..self.network.clone()
        };
        Ok(DualConfig::builder()
            .n_exercise(self.problem.n_exercise)
            .n_steps(self.problem.n_steps.unwrap_or(data_steps))
            .network(network)
            .training(self.training.training_config())
            .fit_paths(fit_paths)
            .seed(self.training.seed)
            .build()?)
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Log level override
    pub log_level: Option<String>,
    /// Epoch budget override
    pub epochs: Option<usize>,
    /// Seed override
    pub seed: Option<u64>,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<RunConfig, ConfigError> {
    let mut config = if let Some(config_path) = &cli.config_file {
        RunConfig::from_file(config_path)?
    } else {
        RunConfig::default()
    };

    config.apply_env()?;
    config.merge_with_cli(cli)?;

    config.validate()?;

    Ok(config)
}
