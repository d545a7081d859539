//! JSON data loading
//!
//! A data file holds a training and a test sample set:
//!
//! ```json
//! {
//!   "train": { "features": [[[0.0]]], "payoffs": [[0.0]], "increments": [[0.0]] },
//!   "test":  { "features": [[[0.0]]], "payoffs": [[0.0]] }
//! }
//! ```
//!
//! `features` is nested path → time → feature; `payoffs` and `increments`
//! are path → time. Increments are only needed for the upper bound.

use serde::Deserialize;
use std::path::Path;
use stopping_core::types::{Matrix, PathTensor};
use stopping_pricing::SampleSet;
use tracing::debug;

use crate::{CliError, Result};

/// One sample set as stored on disk
#[derive(Debug, Clone, Deserialize)]
pub struct SampleData {
    pub features: Vec<Vec<Vec<f64>>>,
    pub payoffs: Vec<Vec<f64>>,
    #[serde(default)]
    pub increments: Option<Vec<Vec<f64>>>,
}

impl SampleData {
    /// Convert into typed tensors
    pub fn into_sample_set(self) -> Result<SampleSet> {
        let features = PathTensor::from_nested(&self.features)?;
        let payoffs = Matrix::from_rows(&self.payoffs)?;
        let increments = self
            .increments
            .map(|rows| Matrix::from_rows(&rows))
            .transpose()?;
        Ok(SampleSet::new(features, payoffs, increments)?)
    }
}

#[derive(Debug, Deserialize)]
struct DataFile {
    train: SampleData,
    test: SampleData,
}

/// Training and test sample sets
#[derive(Debug, Clone)]
pub struct RunData {
    pub train: SampleSet,
    pub test: SampleSet,
}

impl RunData {
    /// Parse a data file from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let file: DataFile = serde_json::from_str(content)?;
        let data = Self {
            train: file.train.into_sample_set()?,
            test: file.test.into_sample_set()?,
        };
        debug!(
            train_paths = data.train.n_paths(),
            test_paths = data.test.n_paths(),
            steps = data.train.n_steps(),
            features = data.train.features.n_features(),
            "Loaded sample sets"
        );
        Ok(data)
    }

    /// Load a data file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        Self::from_json(&content)
    }

    /// Increment columns of the training set, if present
    pub fn increment_steps(&self) -> Option<usize> {
        self.train.increments.as_ref().map(Matrix::cols)
    }
}
