//! Training-graph compilation with degraded-mode fallback.
//!
//! Compiling binds an optimiser and a loss to a model. Two execution modes
//! are attempted in order:
//!
//! 1. [`ExecutionMode::Eager`]: gradient buffers are reallocated for every
//!    batch. Unavailable above [`EAGER_PARAMETER_LIMIT`] parameters.
//! 2. [`ExecutionMode::Deferred`]: gradient buffers are allocated once and
//!    zeroed between batches.
//!
//! If both attempts fail the model enters [`CompileState::Degraded`]: fit
//! becomes a logged no-op and predict returns zeros of the expected shape.
//! Degradation is never surfaced as an error.

use std::fmt;

use tracing::{info, warn};

use crate::error::CompileError;
use crate::loss::LossKind;
use crate::optimiser::Adam;

/// Largest parameter count for which eager execution is attempted.
pub const EAGER_PARAMETER_LIMIT: usize = 4_000_000;

/// How gradient buffers are managed during training.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fresh gradient buffers per batch
    Eager,
    /// Pre-allocated gradient buffers reused across batches
    Deferred,
}

impl ExecutionMode {
    /// Whether gradient buffers are reallocated for each batch.
    #[inline]
    pub fn reallocates(self) -> bool {
        matches!(self, Self::Eager)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager => f.write_str("eager"),
            Self::Deferred => f.write_str("deferred"),
        }
    }
}

/// A successfully compiled training setup.
#[derive(Clone, Debug)]
pub struct CompiledTraining {
    /// Execution mode that succeeded
    pub mode: ExecutionMode,
    /// Loss being minimised
    pub loss: LossKind,
    /// Optimiser state
    pub optimiser: Adam,
}

/// Compilation state of a model.
#[derive(Clone, Debug, Default)]
pub enum CompileState {
    /// Not compiled: weights usable for inference, fit is a no-op
    #[default]
    Uncompiled,
    /// Ready to train
    Ready(CompiledTraining),
    /// Every compile attempt failed
    Degraded {
        /// Joined failure messages of all attempts
        reason: String,
    },
}

impl CompileState {
    /// Whether the model is in degraded mode.
    #[inline]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Whether the model can train.
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Execution mode, if compiled.
    pub fn mode(&self) -> Option<ExecutionMode> {
        match self {
            Self::Ready(compiled) => Some(compiled.mode),
            _ => None,
        }
    }
}

/// Attempts eager then deferred compilation, falling back to degraded mode.
///
/// `accepts_loss` states which losses the model can train with.
pub fn compile_with_fallback(
    model: &str,
    learning_rate: f64,
    loss: LossKind,
    parameter_count: usize,
    accepts_loss: impl Fn(&LossKind) -> bool,
) -> CompileState {
    let mut failures = Vec::new();
    for mode in [ExecutionMode::Eager, ExecutionMode::Deferred] {
        match attempt(mode, learning_rate, loss, parameter_count, &accepts_loss) {
            Ok(compiled) => {
                info!(model, %mode, loss = %loss, learning_rate, "Compiled training graph");
                return CompileState::Ready(compiled);
            }
            Err(e) => {
                warn!(model, %mode, error = %e, "Compile attempt failed");
                failures.push(format!("{mode}: {e}"));
            }
        }
    }
    warn!(model, "Setting model to degraded mode");
    CompileState::Degraded {
        reason: failures.join("; "),
    }
}

fn attempt(
    mode: ExecutionMode,
    learning_rate: f64,
    loss: LossKind,
    parameter_count: usize,
    accepts_loss: &impl Fn(&LossKind) -> bool,
) -> Result<CompiledTraining, CompileError> {
    if !learning_rate.is_finite() || learning_rate <= 0.0 {
        return Err(CompileError::InvalidLearningRate(learning_rate));
    }
    if !accepts_loss(&loss) || !loss.is_well_formed() {
        return Err(CompileError::UnsupportedLoss(loss.name().to_string()));
    }
    if mode == ExecutionMode::Eager && parameter_count > EAGER_PARAMETER_LIMIT {
        return Err(CompileError::EagerUnavailable {
            parameters: parameter_count,
            limit: EAGER_PARAMETER_LIMIT,
        });
    }
    Ok(CompiledTraining {
        mode,
        loss,
        optimiser: Adam::new(learning_rate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_model_compiles_eagerly() {
        let state = compile_with_fallback("test", 1e-3, LossKind::MeanSquaredError, 100, |_| true);
        assert_eq!(state.mode(), Some(ExecutionMode::Eager));
    }

    #[test]
    fn test_large_model_falls_back_to_deferred() {
        let state = compile_with_fallback(
            "test",
            1e-3,
            LossKind::MeanSquaredError,
            EAGER_PARAMETER_LIMIT + 1,
            |_| true,
        );
        assert_eq!(state.mode(), Some(ExecutionMode::Deferred));
    }

    #[test]
    fn test_invalid_learning_rate_degrades() {
        let state = compile_with_fallback("test", f64::NAN, LossKind::MeanSquaredError, 10, |_| true);
        assert!(state.is_degraded());
        if let CompileState::Degraded { reason } = state {
            assert!(reason.contains("eager"));
            assert!(reason.contains("deferred"));
        }
    }

    #[test]
    fn test_rejected_loss_degrades() {
        let state = compile_with_fallback("test", 1e-3, LossKind::DualMaxGap, 10, |l| l.is_supervised());
        assert!(state.is_degraded());
        assert!(!state.is_ready());
    }
}
