//! CLI error types.

use std::path::PathBuf;

use stopping_core::types::{GridError, TensorError};
use stopping_models::ModelError;
use stopping_pricing::EngineError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by `sigstop` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON data or report.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid run configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Data tensors could not be built.
    #[error("Data error: {0}")]
    Tensor(#[from] TensorError),

    /// Exercise grid does not fit the data.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Engine failure.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Model persistence failure.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Missing or inconsistent command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// I/O error at `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
