//! Fully connected layer with optional L2 kernel penalty.

use serde::{Deserialize, Serialize};
use stopping_core::types::Matrix;

use super::reset_buffer;
use crate::linalg;
use crate::rng::ModelRng;

/// Affine map `y = x · W + b` with a Glorot-uniform kernel and zero bias.
///
/// When `l2 > 0` the penalty `l2 · Σ W²` is added to the training loss; the
/// bias is never penalised.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dense {
    fan_in: usize,
    fan_out: usize,
    kernel: Vec<f64>,
    bias: Vec<f64>,
    l2: f64,
    #[serde(skip)]
    grad_kernel: Vec<f64>,
    #[serde(skip)]
    grad_bias: Vec<f64>,
}

impl Dense {
    /// Creates a layer of shape `fan_in → fan_out`.
    pub fn new(fan_in: usize, fan_out: usize, l2: f64, rng: &mut ModelRng) -> Self {
        let mut kernel = vec![0.0; fan_in * fan_out];
        rng.fill_glorot_uniform(&mut kernel, fan_in, fan_out);
        Self {
            fan_in,
            fan_out,
            kernel,
            bias: vec![0.0; fan_out],
            l2,
            grad_kernel: Vec::new(),
            grad_bias: Vec::new(),
        }
    }

    /// Input width.
    #[inline]
    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Output width.
    #[inline]
    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Row-major `fan_in × fan_out` kernel.
    #[inline]
    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }

    /// Bias vector.
    #[inline]
    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    /// L2 coefficient applied to the kernel.
    #[inline]
    pub fn l2(&self) -> f64 {
        self.l2
    }

    /// Applies the layer.
    pub fn forward(&self, x: &Matrix) -> Matrix {
        let mut y = linalg::matmul(x, &self.kernel, self.fan_out);
        linalg::add_bias(&mut y, &self.bias);
        y
    }

    /// Accumulates parameter gradients and returns the input gradient.
    pub(crate) fn backward(&mut self, input: &Matrix, grad: &Matrix) -> Matrix {
        linalg::accumulate_outer(input, grad, &mut self.grad_kernel);
        linalg::accumulate_column_sums(grad, &mut self.grad_bias);
        linalg::matmul_transposed(grad, &self.kernel, self.fan_in)
    }

    /// `l2 · Σ W²`.
    pub fn penalty(&self) -> f64 {
        if self.l2 == 0.0 {
            return 0.0;
        }
        self.l2 * self.kernel.iter().map(|w| w * w).sum::<f64>()
    }

    pub(crate) fn add_penalty_gradient(&mut self) {
        if self.l2 == 0.0 {
            return;
        }
        for (g, w) in self.grad_kernel.iter_mut().zip(&self.kernel) {
            *g += 2.0 * self.l2 * w;
        }
    }

    pub(crate) fn reset_gradients(&mut self, reallocate: bool) {
        reset_buffer(&mut self.grad_kernel, self.kernel.len(), reallocate);
        reset_buffer(&mut self.grad_bias, self.bias.len(), reallocate);
    }

    pub(crate) fn visit_trainable(&mut self, f: &mut dyn FnMut(&mut [f64], &[f64])) {
        f(&mut self.kernel, &self.grad_kernel);
        f(&mut self.bias, &self.grad_bias);
    }

    pub(crate) fn weights(&self) -> Vec<Vec<f64>> {
        vec![self.kernel.clone(), self.bias.clone()]
    }

    pub(crate) fn weight_lengths(&self) -> Vec<usize> {
        vec![self.kernel.len(), self.bias.len()]
    }

    pub(crate) fn load_weights(&mut self, arrays: &[Vec<f64>]) {
        self.kernel.copy_from_slice(&arrays[0]);
        self.bias.copy_from_slice(&arrays[1]);
    }

    pub(crate) fn parameter_count(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }

    #[cfg(test)]
    pub(crate) fn gradients(&self) -> (&[f64], &[f64]) {
        (&self.grad_kernel, &self.grad_bias)
    }
}
