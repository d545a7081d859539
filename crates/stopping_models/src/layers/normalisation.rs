//! Batch and layer normalisation.
//!
//! Both share the same backward pass over a normalisation group of `n`
//! elements with normalised values `x̂` and inverse deviation `s`:
//! `dx = s / n · (n·dx̂ − Σdx̂ − x̂·Σ(dx̂·x̂))`.

use serde::{Deserialize, Serialize};
use stopping_core::types::Matrix;

use super::reset_buffer;

/// Batch normalisation epsilon.
pub const BATCH_NORM_EPSILON: f64 = 1e-3;
/// Batch normalisation moving-average momentum.
pub const BATCH_NORM_MOMENTUM: f64 = 0.99;
/// Layer normalisation epsilon.
pub const LAYER_NORM_EPSILON: f64 = 1e-6;

/// Training-time normalisation cache.
#[derive(Clone, Debug)]
pub(crate) struct NormCache {
    normalised: Matrix,
    inv_std: Vec<f64>,
}

/// Per-feature normalisation over the batch with learned scale and shift.
///
/// Training uses batch statistics and updates exponential moving averages;
/// inference uses the moving averages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchNorm {
    width: usize,
    gamma: Vec<f64>,
    beta: Vec<f64>,
    moving_mean: Vec<f64>,
    moving_variance: Vec<f64>,
    #[serde(skip)]
    grad_gamma: Vec<f64>,
    #[serde(skip)]
    grad_beta: Vec<f64>,
}

impl BatchNorm {
    /// Creates an identity-initialised layer over `width` features.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            gamma: vec![1.0; width],
            beta: vec![0.0; width],
            moving_mean: vec![0.0; width],
            moving_variance: vec![1.0; width],
            grad_gamma: Vec::new(),
            grad_beta: Vec::new(),
        }
    }

    /// Feature width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Moving mean used at inference.
    #[inline]
    pub fn moving_mean(&self) -> &[f64] {
        &self.moving_mean
    }

    /// Moving variance used at inference.
    #[inline]
    pub fn moving_variance(&self) -> &[f64] {
        &self.moving_variance
    }

    /// Normalises with the moving statistics.
    pub fn infer(&self, x: &Matrix) -> Matrix {
        let mut out = x.clone();
        for r in 0..out.rows() {
            for (c, v) in out.row_mut(r).iter_mut().enumerate() {
                let inv = 1.0 / (self.moving_variance[c] + BATCH_NORM_EPSILON).sqrt();
                *v = self.gamma[c] * (*v - self.moving_mean[c]) * inv + self.beta[c];
            }
        }
        out
    }

    pub(crate) fn forward_train(&mut self, x: &Matrix) -> (Matrix, NormCache) {
        let (rows, cols) = x.shape();
        let n = rows.max(1) as f64;
        let mut mean = vec![0.0; cols];
        for r in 0..rows {
            for (m, v) in mean.iter_mut().zip(x.row(r)) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);
        let mut variance = vec![0.0; cols];
        for r in 0..rows {
            for ((s, v), m) in variance.iter_mut().zip(x.row(r)).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        variance.iter_mut().for_each(|s| *s /= n);

        for c in 0..cols {
            self.moving_mean[c] =
                BATCH_NORM_MOMENTUM * self.moving_mean[c] + (1.0 - BATCH_NORM_MOMENTUM) * mean[c];
            self.moving_variance[c] = BATCH_NORM_MOMENTUM * self.moving_variance[c]
                + (1.0 - BATCH_NORM_MOMENTUM) * variance[c];
        }

        let inv_std: Vec<f64> = variance
            .iter()
            .map(|v| 1.0 / (v + BATCH_NORM_EPSILON).sqrt())
            .collect();
        let mut normalised = x.clone();
        let mut out = x.clone();
        for r in 0..rows {
            let xr = x.row(r);
            let nr = normalised.row_mut(r);
            for c in 0..cols {
                nr[c] = (xr[c] - mean[c]) * inv_std[c];
            }
            let nr = normalised.row(r).to_vec();
            for (c, o) in out.row_mut(r).iter_mut().enumerate() {
                *o = self.gamma[c] * nr[c] + self.beta[c];
            }
        }
        (
            out,
            NormCache {
                normalised,
                inv_std,
            },
        )
    }

    pub(crate) fn backward(&mut self, grad: &Matrix, cache: &NormCache) -> Matrix {
        let (rows, cols) = grad.shape();
        let n = rows.max(1) as f64;
        let mut sum_dxhat = vec![0.0; cols];
        let mut sum_dxhat_xhat = vec![0.0; cols];
        for r in 0..rows {
            let g = grad.row(r);
            let xh = cache.normalised.row(r);
            for c in 0..cols {
                self.grad_gamma[c] += g[c] * xh[c];
                self.grad_beta[c] += g[c];
                let dxhat = g[c] * self.gamma[c];
                sum_dxhat[c] += dxhat;
                sum_dxhat_xhat[c] += dxhat * xh[c];
            }
        }
        let mut dx = Matrix::zeros(rows, cols);
        for r in 0..rows {
            let g = grad.row(r);
            let xh = cache.normalised.row(r);
            for (c, d) in dx.row_mut(r).iter_mut().enumerate() {
                let dxhat = g[c] * self.gamma[c];
                *d = cache.inv_std[c] / n
                    * (n * dxhat - sum_dxhat[c] - xh[c] * sum_dxhat_xhat[c]);
            }
        }
        dx
    }

    pub(crate) fn reset_gradients(&mut self, reallocate: bool) {
        reset_buffer(&mut self.grad_gamma, self.width, reallocate);
        reset_buffer(&mut self.grad_beta, self.width, reallocate);
    }

    pub(crate) fn visit_trainable(&mut self, f: &mut dyn FnMut(&mut [f64], &[f64])) {
        f(&mut self.gamma, &self.grad_gamma);
        f(&mut self.beta, &self.grad_beta);
    }

    pub(crate) fn weights(&self) -> Vec<Vec<f64>> {
        vec![
            self.gamma.clone(),
            self.beta.clone(),
            self.moving_mean.clone(),
            self.moving_variance.clone(),
        ]
    }

    pub(crate) fn load_weights(&mut self, arrays: &[Vec<f64>]) {
        self.gamma.copy_from_slice(&arrays[0]);
        self.beta.copy_from_slice(&arrays[1]);
        self.moving_mean.copy_from_slice(&arrays[2]);
        self.moving_variance.copy_from_slice(&arrays[3]);
    }
}

/// Per-row normalisation over features with learned scale and shift.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerNorm {
    width: usize,
    gamma: Vec<f64>,
    beta: Vec<f64>,
    #[serde(skip)]
    grad_gamma: Vec<f64>,
    #[serde(skip)]
    grad_beta: Vec<f64>,
}

impl LayerNorm {
    /// Creates an identity-initialised layer over `width` features.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            gamma: vec![1.0; width],
            beta: vec![0.0; width],
            grad_gamma: Vec::new(),
            grad_beta: Vec::new(),
        }
    }

    /// Feature width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Normalises every row.
    pub fn infer(&self, x: &Matrix) -> Matrix {
        self.normalise(x).0
    }

    fn normalise(&self, x: &Matrix) -> (Matrix, NormCache) {
        let (rows, cols) = x.shape();
        let n = cols.max(1) as f64;
        let mut normalised = Matrix::zeros(rows, cols);
        let mut out = Matrix::zeros(rows, cols);
        let mut inv_std = Vec::with_capacity(rows);
        for r in 0..rows {
            let xr = x.row(r);
            let mean = xr.iter().sum::<f64>() / n;
            let var = xr.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            let inv = 1.0 / (var + LAYER_NORM_EPSILON).sqrt();
            inv_std.push(inv);
            for (c, v) in normalised.row_mut(r).iter_mut().enumerate() {
                *v = (xr[c] - mean) * inv;
            }
            let nr = normalised.row(r).to_vec();
            for (c, o) in out.row_mut(r).iter_mut().enumerate() {
                *o = self.gamma[c] * nr[c] + self.beta[c];
            }
        }
        (
            out,
            NormCache {
                normalised,
                inv_std,
            },
        )
    }

    pub(crate) fn forward_train(&self, x: &Matrix) -> (Matrix, NormCache) {
        self.normalise(x)
    }

    pub(crate) fn backward(&mut self, grad: &Matrix, cache: &NormCache) -> Matrix {
        let (rows, cols) = grad.shape();
        let n = cols.max(1) as f64;
        let mut dx = Matrix::zeros(rows, cols);
        for r in 0..rows {
            let g = grad.row(r);
            let xh = cache.normalised.row(r);
            let mut sum_dxhat = 0.0;
            let mut sum_dxhat_xhat = 0.0;
            for c in 0..cols {
                self.grad_gamma[c] += g[c] * xh[c];
                self.grad_beta[c] += g[c];
                let dxhat = g[c] * self.gamma[c];
                sum_dxhat += dxhat;
                sum_dxhat_xhat += dxhat * xh[c];
            }
            let inv = cache.inv_std[r];
            for (c, d) in dx.row_mut(r).iter_mut().enumerate() {
                let dxhat = g[c] * self.gamma[c];
                *d = inv / n * (n * dxhat - sum_dxhat - xh[c] * sum_dxhat_xhat);
            }
        }
        dx
    }

    pub(crate) fn reset_gradients(&mut self, reallocate: bool) {
        reset_buffer(&mut self.grad_gamma, self.width, reallocate);
        reset_buffer(&mut self.grad_beta, self.width, reallocate);
    }

    pub(crate) fn visit_trainable(&mut self, f: &mut dyn FnMut(&mut [f64], &[f64])) {
        f(&mut self.gamma, &self.grad_gamma);
        f(&mut self.beta, &self.grad_beta);
    }

    pub(crate) fn weights(&self) -> Vec<Vec<f64>> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    pub(crate) fn load_weights(&mut self, arrays: &[Vec<f64>]) {
        self.gamma.copy_from_slice(&arrays[0]);
        self.beta.copy_from_slice(&arrays[1]);
    }
}
