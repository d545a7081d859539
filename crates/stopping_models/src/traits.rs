//! Operations common to every trainable model.

use std::path::Path;

use crate::compile::CompileState;
use crate::error::ModelError;
use crate::loss::LossKind;

/// A trainable, persistable model.
///
/// Implemented by [`crate::Regressor`] and [`crate::DualNetwork`].
pub trait TrainableModel {
    /// Artifact kind tag.
    fn kind(&self) -> &'static str;

    /// Binds an optimiser and loss; never fails, degrading instead.
    fn compile(&mut self, learning_rate: f64, loss: LossKind);

    /// Current compilation state.
    fn compile_state(&self) -> &CompileState;

    /// Whether the model is in degraded mode.
    fn is_degraded(&self) -> bool {
        self.compile_state().is_degraded()
    }

    /// Raw weight snapshot in layer order.
    fn get_weights(&self) -> Vec<Vec<f64>>;

    /// Replaces every weight array.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IncompatibleWeights`] or
    /// [`ModelError::IncompatibleWeightArray`] on shape mismatch.
    fn set_weights(&mut self, weights: &[Vec<f64>]) -> Result<(), ModelError>;

    /// Total number of scalar parameters.
    fn parameter_count(&self) -> usize;

    /// Human-readable layer table.
    fn summary(&self) -> String;

    /// Saves the model as a JSON artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Io`] or [`ModelError::Serialisation`].
    fn save(&self, path: &Path) -> Result<(), ModelError>;
}
