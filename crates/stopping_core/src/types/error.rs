//! Error types for structured error handling.
//!
//! This module provides:
//! - `TensorError`: Errors from tensor construction and indexing
//! - `GridError`: Errors from exercise grid construction
//! - `ConfigError`: Errors from invalid configuration values

use thiserror::Error;

/// Tensor construction and access errors.
///
/// # Examples
/// ```
/// use stopping_core::types::TensorError;
///
/// let err = TensorError::LengthMismatch { expected: 6, got: 5 };
/// assert_eq!(format!("{}", err), "Data length mismatch: expected 6, got 5");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// Flat buffer length does not match the declared shape.
    #[error("Data length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Product of the declared dimensions
        expected: usize,
        /// Length of the supplied buffer
        got: usize,
    },

    /// Nested input is ragged along one axis.
    #[error("Ragged input along {axis}: expected {expected}, got {got} at position {position}")]
    Ragged {
        /// Axis name ("time", "feature", "column")
        axis: &'static str,
        /// Length of the first entry
        expected: usize,
        /// Offending length
        got: usize,
        /// Index of the offending entry
        position: usize,
    },

    /// Two tensors disagree on a shared axis.
    #[error("Shape mismatch on {axis}: {left} vs {right}")]
    ShapeMismatch {
        /// Axis name
        axis: &'static str,
        /// Size of the left operand
        left: usize,
        /// Size of the right operand
        right: usize,
    },

    /// Index outside the valid range of an axis.
    #[error("Index {index} out of range for {axis} of length {len}")]
    IndexOutOfRange {
        /// Axis name
        axis: &'static str,
        /// Requested index
        index: usize,
        /// Axis length
        len: usize,
    },
}

/// Exercise grid construction errors.
///
/// # Examples
/// ```
/// use stopping_core::types::GridError;
///
/// let err = GridError::TooManyExerciseDates { n_exercise: 5, n_steps: 3 };
/// assert!(format!("{}", err).contains("5 exercise dates"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Number of exercise dates must be positive.
    #[error("Number of exercise dates must be positive")]
    NoExerciseDates,

    /// Number of simulation steps must be positive.
    #[error("Number of simulation steps must be positive")]
    NoSteps,

    /// More exercise dates than simulation steps breaks strict monotonicity.
    #[error("Cannot place {n_exercise} exercise dates on {n_steps} simulation steps")]
    TooManyExerciseDates {
        /// Requested exercise dates
        n_exercise: usize,
        /// Available simulation steps
        n_steps: usize,
    },
}

/// Configuration errors.
///
/// These errors occur during construction when invalid parameters are provided
/// and are never recovered locally.
///
/// # Examples
/// ```
/// use stopping_core::types::ConfigError;
///
/// let err = ConfigError::UnknownMode("Bermudan".to_string());
/// assert_eq!(format!("{}", err), "Invalid mode: Bermudan");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },

    /// Unknown exercise mode name.
    #[error("Invalid mode: {0}")]
    UnknownMode(String),

    /// Unknown activation function name.
    #[error("Unknown activation function: {0}")]
    UnknownActivation(String),

    /// Unknown loss name.
    #[error("Unknown loss: {0}")]
    UnknownLoss(String),
}

impl ConfigError {
    /// Create an invalid-parameter error
    pub fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_error_display() {
        let err = TensorError::ShapeMismatch {
            axis: "path",
            left: 10,
            right: 12,
        };
        assert_eq!(err.to_string(), "Shape mismatch on path: 10 vs 12");

        let err = TensorError::IndexOutOfRange {
            axis: "time",
            index: 7,
            len: 5,
        };
        assert!(err.to_string().contains("Index 7 out of range"));
    }

    #[test]
    fn test_grid_error_display() {
        assert_eq!(
            GridError::NoExerciseDates.to_string(),
            "Number of exercise dates must be positive"
        );
    }

    #[test]
    fn test_config_error_invalid_helper() {
        let err = ConfigError::invalid("learning_rate", "must be positive");
        assert_eq!(
            err,
            ConfigError::InvalidParameter {
                name: "learning_rate",
                value: "must be positive".to_string()
            }
        );
        assert!(err.to_string().contains("learning_rate"));
    }
}
