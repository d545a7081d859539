//! # stopping_pricing: Lower and Upper Bounds for Optimal Stopping
//!
//! ## Layer 3 (Engines) Role
//!
//! stopping_pricing turns simulated paths into price bounds for an optimal
//! stopping problem observed through path signatures:
//! - [`LongstaffSchwartzEngine`]: backward-induction regression, giving a
//!   lower bound from the learned stopping rule
//! - [`DualEngine`]: martingale duality, giving an upper bound from a learned
//!   martingale
//!
//! Both engines take a training and a test [`SampleSet`]. Models are fitted
//! on the former and the bound is estimated on the latter.
//!
//! ## Recovery
//!
//! Engines fail only on configuration errors and tensors that cannot be
//! reconciled. Degraded models, skipped exercise dates, failed weight
//! transfers and clipped dimensions are logged through `tracing` and the run
//! continues.
//!
//! ## Usage Examples
//!
//! ```rust
//! use stopping_core::types::{Matrix, PathTensor};
//! use stopping_models::config::NetworkConfig;
//! use stopping_pricing::config::{ExerciseMode, LsmConfig, TrainingConfig};
//! use stopping_pricing::{LongstaffSchwartzEngine, SampleSet};
//!
//! let config = LsmConfig::builder()
//!     .n_exercise(3)
//!     .horizon(1.0)
//!     .rate(0.05)
//!     .mode(ExerciseMode::AmericanOption)
//!     .network(NetworkConfig::builder().layers(1).nodes(4).build().unwrap())
//!     .training(TrainingConfig { epochs: 3, ..TrainingConfig::default() })
//!     .build()
//!     .unwrap();
//!
//! let set = SampleSet::new(PathTensor::zeros(16, 4, 2), Matrix::zeros(16, 4), None).unwrap();
//! let bound = LongstaffSchwartzEngine::new(config).price(&set, &set).unwrap();
//! assert_eq!(bound.price(), 0.0);
//! assert_eq!(bound.skipped_dates(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): Parallel inference inside the models

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod data;
pub mod dual;
pub mod error;
pub mod lsm;
pub mod result;

pub use config::{DualConfig, ExerciseMode, LsmConfig, TrainingConfig};
pub use data::SampleSet;
pub use dual::DualEngine;
pub use error::EngineError;
pub use lsm::LongstaffSchwartzEngine;
pub use result::{DateReport, LowerBound, UpperBound};
