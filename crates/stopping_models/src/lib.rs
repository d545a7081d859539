//! # stopping_models: Trainable Approximators for Optimal Stopping
//!
//! ## Layer 2 (Models) Role
//!
//! stopping_models provides the function approximators used by the pricing
//! engines:
//! - [`Regressor`]: per-date continuation-value network (lower bound)
//! - [`DualNetwork`]: martingale control network (upper bound)
//!
//! Both are built from the layers in [`layers`], trained with [`Adam`]
//! ([`optimiser`]) under the losses in [`loss`], and persisted as versioned
//! JSON artifacts ([`persistence`]).
//!
//! ## Degraded Mode
//!
//! [`TrainableModel::compile`] never fails. It tries eager then deferred
//! execution ([`compile`]); if both are rejected the model is degraded, fit
//! becomes a logged no-op and predictions are zeros of the expected shape.
//!
//! ## Usage Examples
//!
//! ```rust
//! use stopping_core::types::Matrix;
//! use stopping_models::config::NetworkConfig;
//! use stopping_models::training::FitOptions;
//! use stopping_models::{LossKind, Regressor, RegressorArchitecture, TrainableModel};
//!
//! let config = NetworkConfig::builder().layers(1).nodes(8).build().unwrap();
//! let mut model = Regressor::new(RegressorArchitecture::from_config(1, &config), 42).unwrap();
//! model.compile(1e-2, LossKind::MeanSquaredError);
//!
//! let x = Matrix::from_rows(&[vec![0.0], vec![0.5], vec![1.0]]).unwrap();
//! let y = [0.0, 1.0, 2.0];
//! let history = model.fit(&x, &y, None, &FitOptions::new(3, 5)).unwrap();
//! assert_eq!(history.len(), 5);
//! assert_eq!(model.predict(&x).len(), 3);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): Run inference chunks on the rayon thread pool

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod compile;
pub mod config;
pub mod dual;
pub mod error;
pub mod layers;
pub mod linalg;
pub mod loss;
pub mod network;
pub mod optimiser;
pub mod persistence;
pub mod regressor;
pub mod rng;
pub mod traits;
pub mod training;

pub use compile::{CompileState, ExecutionMode};
pub use dual::{DualArchitecture, DualBatch, DualNetwork};
pub use error::{CompileError, ModelError};
pub use loss::LossKind;
pub use optimiser::Adam;
pub use regressor::{Regressor, RegressorArchitecture};
pub use traits::TrainableModel;
