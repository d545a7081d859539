//! Core tensor, grid and error types.
//!
//! This module provides:
//! - `tensor`: Row-major [`PathTensor`] (path × time × feature) and [`Matrix`] (row × column)
//! - `grid`: [`ExerciseGrid`] and the dual rule-index selection policy
//! - `error`: Structured error types for tensors, grids and configuration
//!
//! # Re-exports
//!
//! For convenience, commonly used types are re-exported at this module level.

pub mod error;
pub mod grid;
pub mod tensor;

// Re-export commonly used types at module level
pub use error::{ConfigError, GridError, TensorError};
pub use grid::{clipped_grid_indices, rule_indices, ExerciseGrid};
pub use tensor::{Matrix, PathTensor};
