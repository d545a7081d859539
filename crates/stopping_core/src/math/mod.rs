//! Mathematical helpers for bound estimation.
//!
//! This module provides:
//! - `statistics`: Sample mean and population standard deviation of per-path values
//! - `discount`: Per-exercise-date discount factors

pub mod discount;
pub mod statistics;

pub use discount::{discount_factor_per_date, discount_powers};
pub use statistics::{mean, std_dev, SampleSummary};
