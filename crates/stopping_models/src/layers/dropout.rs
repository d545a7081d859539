//! Inverted dropout.

use serde::{Deserialize, Serialize};
use stopping_core::types::Matrix;

use crate::rng::ModelRng;

/// Rate used for hidden-layer dropout.
pub const HIDDEN_DROPOUT_RATE: f64 = 0.5;

/// Zeroes a fraction `rate` of activations during training and rescales the
/// survivors by `1 / (1 - rate)`. Identity at inference.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dropout {
    rate: f64,
}

impl Dropout {
    /// Creates a dropout layer.
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }

    /// Drop probability.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub(crate) fn forward_train(&self, x: &Matrix, rng: &mut ModelRng) -> (Matrix, Vec<f64>) {
        let mask = rng.dropout_mask(x.as_slice().len(), self.rate);
        let mut out = x.clone();
        for (v, m) in out.as_mut_slice().iter_mut().zip(&mask) {
            *v *= m;
        }
        (out, mask)
    }

    pub(crate) fn backward(grad: &Matrix, mask: &[f64]) -> Matrix {
        let mut out = grad.clone();
        for (g, m) in out.as_mut_slice().iter_mut().zip(mask) {
            *g *= m;
        }
        out
    }
}
