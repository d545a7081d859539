//! Network layers with forward, inference and backward passes.
//!
//! This module provides:
//! - `dense`: Fully connected [`Dense`] layer with L2 kernel penalty
//! - `activation`: Element-wise [`Activation`] functions
//! - `normalisation`: [`BatchNorm`] and [`LayerNorm`]
//! - `dropout`: Inverted [`Dropout`]
//! - `attention`: [`CausalSelfAttention`] over per-path sequences
//!
//! Every layer is a variant of [`Layer`]. Training passes return a cache
//! consumed by the matching backward pass; inference passes take `&self`
//! and may run concurrently.

pub mod activation;
pub mod attention;
pub mod dense;
pub mod dropout;
pub mod normalisation;

pub use activation::Activation;
pub use attention::CausalSelfAttention;
pub use dense::Dense;
pub use dropout::Dropout;
pub use normalisation::{BatchNorm, LayerNorm};

use serde::{Deserialize, Serialize};
use stopping_core::types::Matrix;

use crate::rng::ModelRng;
use attention::AttentionCache;
use normalisation::NormCache;

/// Zeroes a gradient buffer, reallocating it when asked or when its length
/// no longer matches.
pub(crate) fn reset_buffer(buffer: &mut Vec<f64>, len: usize, reallocate: bool) {
    if reallocate || buffer.len() != len {
        *buffer = vec![0.0; len];
    } else {
        buffer.fill(0.0);
    }
}

/// A single network layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Fully connected layer
    Dense(Dense),
    /// Element-wise activation
    Activation(Activation),
    /// Batch normalisation
    BatchNorm(BatchNorm),
    /// Layer normalisation
    LayerNorm(LayerNorm),
    /// Dropout
    Dropout(Dropout),
    /// Causal self-attention
    Attention(CausalSelfAttention),
}

/// State captured by a training forward pass.
#[derive(Clone, Debug)]
pub(crate) enum LayerCache {
    Input(Matrix),
    Norm(NormCache),
    Mask(Vec<f64>),
    Attention(Box<AttentionCache>),
}

impl Layer {
    /// Short layer type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dense(_) => "Dense",
            Self::Activation(_) => "Activation",
            Self::BatchNorm(_) => "BatchNormalization",
            Self::LayerNorm(_) => "LayerNormalization",
            Self::Dropout(_) => "Dropout",
            Self::Attention(_) => "MultiHeadAttention",
        }
    }

    /// Output width for a given input width.
    pub fn output_width(&self, input_width: usize) -> usize {
        match self {
            Self::Dense(dense) => dense.fan_out(),
            _ => input_width,
        }
    }

    /// Inference pass.
    pub fn infer(&self, x: &Matrix, seq_len: usize) -> Matrix {
        match self {
            Self::Dense(dense) => dense.forward(x),
            Self::Activation(act) => act.forward(x),
            Self::BatchNorm(bn) => bn.infer(x),
            Self::LayerNorm(ln) => ln.infer(x),
            Self::Dropout(_) => x.clone(),
            Self::Attention(att) => att.infer(x, seq_len),
        }
    }

    pub(crate) fn forward_train(
        &mut self,
        x: Matrix,
        seq_len: usize,
        rng: &mut ModelRng,
    ) -> (Matrix, LayerCache) {
        match self {
            Self::Dense(dense) => {
                let y = dense.forward(&x);
                (y, LayerCache::Input(x))
            }
            Self::Activation(act) => {
                let y = act.forward(&x);
                (y, LayerCache::Input(x))
            }
            Self::BatchNorm(bn) => {
                let (y, cache) = bn.forward_train(&x);
                (y, LayerCache::Norm(cache))
            }
            Self::LayerNorm(ln) => {
                let (y, cache) = ln.forward_train(&x);
                (y, LayerCache::Norm(cache))
            }
            Self::Dropout(dropout) => {
                let (y, mask) = dropout.forward_train(&x, rng);
                (y, LayerCache::Mask(mask))
            }
            Self::Attention(att) => {
                let (y, cache) = att.forward_train(&x, seq_len, rng);
                (y, LayerCache::Attention(Box::new(cache)))
            }
        }
    }

    pub(crate) fn backward(&mut self, grad: &Matrix, cache: &LayerCache, seq_len: usize) -> Matrix {
        match (self, cache) {
            (Self::Dense(dense), LayerCache::Input(input)) => dense.backward(input, grad),
            (Self::Activation(act), LayerCache::Input(input)) => act.backward(input, grad),
            (Self::BatchNorm(bn), LayerCache::Norm(cache)) => bn.backward(grad, cache),
            (Self::LayerNorm(ln), LayerCache::Norm(cache)) => ln.backward(grad, cache),
            (Self::Dropout(_), LayerCache::Mask(mask)) => Dropout::backward(grad, mask),
            (Self::Attention(att), LayerCache::Attention(cache)) => {
                att.backward(grad, cache, seq_len)
            }
            // Caches are produced by the same layer list, in order
            _ => Matrix::zeros(grad.rows(), grad.cols()),
        }
    }

    pub(crate) fn reset_gradients(&mut self, reallocate: bool) {
        match self {
            Self::Dense(dense) => dense.reset_gradients(reallocate),
            Self::BatchNorm(bn) => bn.reset_gradients(reallocate),
            Self::LayerNorm(ln) => ln.reset_gradients(reallocate),
            Self::Attention(att) => att.reset_gradients(reallocate),
            Self::Activation(_) | Self::Dropout(_) => {}
        }
    }

    pub(crate) fn visit_trainable(&mut self, f: &mut dyn FnMut(&mut [f64], &[f64])) {
        match self {
            Self::Dense(dense) => dense.visit_trainable(f),
            Self::BatchNorm(bn) => bn.visit_trainable(f),
            Self::LayerNorm(ln) => ln.visit_trainable(f),
            Self::Attention(att) => att.visit_trainable(f),
            Self::Activation(_) | Self::Dropout(_) => {}
        }
    }

    /// L2 penalty contributed by this layer.
    pub fn penalty(&self) -> f64 {
        match self {
            Self::Dense(dense) => dense.penalty(),
            _ => 0.0,
        }
    }

    pub(crate) fn add_penalty_gradient(&mut self) {
        if let Self::Dense(dense) = self {
            dense.add_penalty_gradient();
        }
    }

    /// Weight arrays in exchange order.
    ///
    /// Dense: kernel, bias. Batch norm: gamma, beta, moving mean, moving
    /// variance. Layer norm: gamma, beta. Attention: query, key, value and
    /// output projections, each kernel then bias.
    pub fn weights(&self) -> Vec<Vec<f64>> {
        match self {
            Self::Dense(dense) => dense.weights(),
            Self::BatchNorm(bn) => bn.weights(),
            Self::LayerNorm(ln) => ln.weights(),
            Self::Attention(att) => att.weights(),
            Self::Activation(_) | Self::Dropout(_) => Vec::new(),
        }
    }

    /// Lengths of the arrays returned by [`Layer::weights`].
    pub fn weight_lengths(&self) -> Vec<usize> {
        match self {
            Self::Dense(dense) => dense.weight_lengths(),
            Self::BatchNorm(bn) => vec![bn.width(); 4],
            Self::LayerNorm(ln) => vec![ln.width(); 2],
            Self::Attention(att) => att.weight_lengths(),
            Self::Activation(_) | Self::Dropout(_) => Vec::new(),
        }
    }

    /// Loads arrays whose count and lengths match [`Layer::weight_lengths`].
    pub(crate) fn load_weights(&mut self, arrays: &[Vec<f64>]) {
        match self {
            Self::Dense(dense) => dense.load_weights(arrays),
            Self::BatchNorm(bn) => bn.load_weights(arrays),
            Self::LayerNorm(ln) => ln.load_weights(arrays),
            Self::Attention(att) => att.load_weights(arrays),
            Self::Activation(_) | Self::Dropout(_) => {}
        }
    }

    /// Total number of scalar parameters, including moving statistics.
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Dense(dense) => dense.parameter_count(),
            Self::Attention(att) => att.parameter_count(),
            _ => self.weight_lengths().iter().sum(),
        }
    }
}
