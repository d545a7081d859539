//! Error types for model construction, weight exchange and persistence.
//!
//! This module provides:
//! - `ModelError`: Errors surfaced to callers of constructors and I/O
//! - `CompileError`: Reasons a single compile attempt was rejected
//!
//! Compile and runtime training failures are never surfaced as `ModelError`;
//! they are logged and absorbed by the degraded-mode policy in
//! [`crate::compile`].

use std::path::PathBuf;

use stopping_core::types::{ConfigError, TensorError};
use thiserror::Error;

/// Model construction, weight exchange and persistence errors.
///
/// # Examples
/// ```
/// use stopping_models::error::ModelError;
///
/// let err = ModelError::IncompatibleWeights { expected: 4, got: 3 };
/// assert_eq!(
///     format!("{}", err),
///     "Incompatible weights: expected 4 arrays, got 3"
/// );
/// ```
#[derive(Error, Debug)]
pub enum ModelError {
    /// Architecture parameters cannot produce a valid network.
    #[error("Invalid architecture: {0}")]
    InvalidArchitecture(String),

    /// Invalid hyperparameter value.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Weight list does not match the network's parameter arrays.
    #[error("Incompatible weights: expected {expected} arrays, got {got}")]
    IncompatibleWeights {
        /// Number of arrays the network holds
        expected: usize,
        /// Number of arrays supplied
        got: usize,
    },

    /// A single weight array has the wrong length.
    #[error("Incompatible weight array {index}: expected {expected} values, got {got}")]
    IncompatibleWeightArray {
        /// Position of the array in weight order
        index: usize,
        /// Expected length
        expected: usize,
        /// Supplied length
        got: usize,
    },

    /// Input tensor shape does not fit the network.
    #[error(transparent)]
    Shape(#[from] TensorError),

    /// File system failure while saving or loading an artifact.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be encoded or decoded.
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// Artifact kind or format version is not understood.
    #[error("Unsupported artifact: {0}")]
    UnsupportedArtifact(String),
}

impl ModelError {
    /// Create an invalid-architecture error
    pub fn architecture(message: impl Into<String>) -> Self {
        Self::InvalidArchitecture(message.into())
    }
}

/// Reasons a compile attempt was rejected.
///
/// # Examples
/// ```
/// use stopping_models::error::CompileError;
///
/// let err = CompileError::InvalidLearningRate(-1.0);
/// assert!(format!("{}", err).contains("-1"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Learning rate must be finite and positive.
    #[error("Learning rate must be finite and positive, got {0}")]
    InvalidLearningRate(f64),

    /// The loss cannot train this model.
    #[error("Loss '{0}' is not supported by this model")]
    UnsupportedLoss(String),

    /// Eager execution keeps per-batch buffers and is capped by size.
    #[error("Eager execution unavailable for {parameters} parameters (limit {limit})")]
    EagerUnavailable {
        /// Parameter count of the network
        parameters: usize,
        /// Eager parameter limit
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_from_tensor_error() {
        let err: ModelError = TensorError::ShapeMismatch {
            axis: "feature",
            left: 3,
            right: 4,
        }
        .into();
        assert!(matches!(err, ModelError::Shape(_)));
        assert_eq!(err.to_string(), "Shape mismatch on feature: 3 vs 4");
    }

    #[test]
    fn test_architecture_helper() {
        let err = ModelError::architecture("feature dimension must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid architecture: feature dimension must be positive"
        );
    }

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::EagerUnavailable {
            parameters: 10,
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "Eager execution unavailable for 10 parameters (limit 5)"
        );
    }
}
