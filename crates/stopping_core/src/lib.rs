//! # stopping_core: Foundation for Signature-Based Optimal Stopping
//!
//! ## Layer 1 (Foundation) Role
//!
//! stopping_core serves as the bottom layer of the stopping workspace, providing:
//! - Row-major path tensors and matrices (`types::tensor`)
//! - Exercise grids and rule-index selection (`types::grid`)
//! - Sample statistics and discounting helpers (`math`)
//! - Error types: `TensorError`, `GridError`, `ConfigError` (`types::error`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other stopping_* crates, with minimal external dependencies:
//! - thiserror: Structured error enums
//! - serde: Serialisation support (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use stopping_core::types::{ExerciseGrid, Matrix, PathTensor};
//! use stopping_core::math::statistics::SampleSummary;
//!
//! // 2 paths, 5 time points (4 steps), 3 features
//! let features = PathTensor::zeros(2, 5, 3);
//! assert_eq!(features.n_steps(), 4);
//!
//! // Two exercise dates on a four step discretisation
//! let grid = ExerciseGrid::new(4, 2).unwrap();
//! assert_eq!(grid.indices(), &[0, 2, 4]);
//! assert_eq!(grid.exercise_indices(), &[2, 4]);
//!
//! let payoffs = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
//! let summary = SampleSummary::from_values(&payoffs.column(1));
//! assert_eq!(summary.mean, 3.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialisation for tensors and grids

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod math;
pub mod types;
