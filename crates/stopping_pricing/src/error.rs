//! Engine error types.

use stopping_core::types::{ConfigError, GridError, TensorError};
use stopping_models::ModelError;
use thiserror::Error;

/// Errors returned by the pricing engines.
///
/// Recoverable conditions (degraded models, skipped dates, failed weight
/// transfers, clipped dimensions) are logged and never produce an error.
///
/// # Examples
/// ```
/// use stopping_pricing::EngineError;
///
/// let err = EngineError::InsufficientPaths { needed: 2, got: 1, purpose: "training" };
/// assert_eq!(format!("{}", err), "Insufficient paths for training: needed 2, got 1");
/// ```
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Exercise grid could not be built.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Input tensors disagree.
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// Model construction failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Not enough paths for the requested split.
    #[error("Insufficient paths for {purpose}: needed {needed}, got {got}")]
    InsufficientPaths {
        /// Minimum number of paths required
        needed: usize,
        /// Number of paths available
        got: usize,
        /// What the paths were needed for
        purpose: &'static str,
    },

    /// The upper-bound engine needs Brownian increments.
    #[error("Brownian increments are required for the {0} sample set")]
    MissingIncrements(&'static str),
}
