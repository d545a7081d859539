//! Causal multi-head self-attention over per-path time sequences.
//!
//! The input holds `n_sequences * seq_len` rows, sequence-major. Each row
//! attends only to rows of the same sequence at the same or earlier time
//! index, so the output at time `t` never depends on later observations.

use serde::{Deserialize, Serialize};
use stopping_core::types::Matrix;

use super::dense::Dense;
use crate::linalg::softmax_in_place;
use crate::rng::ModelRng;

/// Number of attention heads.
pub const ATTENTION_HEADS: usize = 2;
/// Dropout rate on the attention weights.
pub const ATTENTION_DROPOUT_RATE: f64 = 0.1;

/// Training-time attention cache.
#[derive(Clone, Debug)]
pub(crate) struct AttentionCache {
    input: Matrix,
    query: Matrix,
    key: Matrix,
    value: Matrix,
    probabilities: Vec<f64>,
    mask: Option<Vec<f64>>,
    context: Matrix,
}

/// Multi-head scaled dot-product self-attention with a causal mask.
///
/// Output width equals input width. Key width per head is
/// `max(1, width / 2)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CausalSelfAttention {
    width: usize,
    heads: usize,
    key_dim: usize,
    dropout: f64,
    query: Dense,
    key: Dense,
    value: Dense,
    output: Dense,
}

impl CausalSelfAttention {
    /// Creates a layer over `width` features.
    pub fn new(width: usize, rng: &mut ModelRng) -> Self {
        let heads = ATTENTION_HEADS;
        let key_dim = (width / 2).max(1);
        let projected = heads * key_dim;
        Self {
            width,
            heads,
            key_dim,
            dropout: ATTENTION_DROPOUT_RATE,
            query: Dense::new(width, projected, 0.0, rng),
            key: Dense::new(width, projected, 0.0, rng),
            value: Dense::new(width, projected, 0.0, rng),
            output: Dense::new(projected, width, 0.0, rng),
        }
    }

    /// Feature width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of heads.
    #[inline]
    pub fn heads(&self) -> usize {
        self.heads
    }

    /// Key width per head.
    #[inline]
    pub fn key_dim(&self) -> usize {
        self.key_dim
    }

    fn projections(&self) -> [&Dense; 4] {
        [&self.query, &self.key, &self.value, &self.output]
    }

    fn projections_mut(&mut self) -> [&mut Dense; 4] {
        [
            &mut self.query,
            &mut self.key,
            &mut self.value,
            &mut self.output,
        ]
    }

    /// Attention weights for every (sequence, head, query time) row,
    /// laid out `[sequence][head][i][j]`.
    fn attention_probabilities(&self, query: &Matrix, key: &Matrix, seq_len: usize) -> Vec<f64> {
        let n_seq = query.rows() / seq_len;
        let dk = self.key_dim;
        let scale = 1.0 / (dk as f64).sqrt();
        let mut probabilities = vec![0.0; n_seq * self.heads * seq_len * seq_len];
        for s in 0..n_seq {
            let base = s * seq_len;
            for h in 0..self.heads {
                let cols = h * dk..(h + 1) * dk;
                for i in 0..seq_len {
                    let offset = ((s * self.heads + h) * seq_len + i) * seq_len;
                    let row = &mut probabilities[offset..offset + seq_len];
                    let q = &query.row(base + i)[cols.clone()];
                    for (j, p) in row.iter_mut().enumerate() {
                        *p = if j <= i {
                            let k = &key.row(base + j)[cols.clone()];
                            q.iter().zip(k).map(|(a, b)| a * b).sum::<f64>() * scale
                        } else {
                            f64::NEG_INFINITY
                        };
                    }
                    softmax_in_place(row);
                }
            }
        }
        probabilities
    }

    fn weighted_values(
        &self,
        weights: &[f64],
        value: &Matrix,
        seq_len: usize,
    ) -> Matrix {
        let n_seq = value.rows() / seq_len;
        let dk = self.key_dim;
        let mut context = Matrix::zeros(value.rows(), self.heads * dk);
        for s in 0..n_seq {
            let base = s * seq_len;
            for h in 0..self.heads {
                for i in 0..seq_len {
                    let offset = ((s * self.heads + h) * seq_len + i) * seq_len;
                    for j in 0..=i {
                        let w = weights[offset + j];
                        if w == 0.0 {
                            continue;
                        }
                        let v = value.row(base + j)[h * dk..(h + 1) * dk].to_vec();
                        let out = &mut context.row_mut(base + i)[h * dk..(h + 1) * dk];
                        for (o, x) in out.iter_mut().zip(&v) {
                            *o += w * x;
                        }
                    }
                }
            }
        }
        context
    }

    /// Applies the layer without attention dropout.
    pub fn infer(&self, x: &Matrix, seq_len: usize) -> Matrix {
        let query = self.query.forward(x);
        let key = self.key.forward(x);
        let value = self.value.forward(x);
        let probabilities = self.attention_probabilities(&query, &key, seq_len);
        let context = self.weighted_values(&probabilities, &value, seq_len);
        self.output.forward(&context)
    }

    pub(crate) fn forward_train(
        &self,
        x: &Matrix,
        seq_len: usize,
        rng: &mut ModelRng,
    ) -> (Matrix, AttentionCache) {
        let query = self.query.forward(x);
        let key = self.key.forward(x);
        let value = self.value.forward(x);
        let probabilities = self.attention_probabilities(&query, &key, seq_len);
        let mask = (self.dropout > 0.0).then(|| rng.dropout_mask(probabilities.len(), self.dropout));
        let context = match &mask {
            Some(mask) => {
                let dropped: Vec<f64> = probabilities.iter().zip(mask).map(|(p, m)| p * m).collect();
                self.weighted_values(&dropped, &value, seq_len)
            }
            None => self.weighted_values(&probabilities, &value, seq_len),
        };
        let out = self.output.forward(&context);
        (
            out,
            AttentionCache {
                input: x.clone(),
                query,
                key,
                value,
                probabilities,
                mask,
                context,
            },
        )
    }

    pub(crate) fn backward(
        &mut self,
        grad: &Matrix,
        cache: &AttentionCache,
        seq_len: usize,
    ) -> Matrix {
        let d_context = self.output.backward(&cache.context, grad);
        let rows = grad.rows();
        let n_seq = rows / seq_len;
        let dk = self.key_dim;
        let scale = 1.0 / (dk as f64).sqrt();
        let projected = self.heads * dk;
        let mut d_query = Matrix::zeros(rows, projected);
        let mut d_key = Matrix::zeros(rows, projected);
        let mut d_value = Matrix::zeros(rows, projected);
        let mut d_weights = vec![0.0; seq_len];
        let mut d_scores = vec![0.0; seq_len];

        for s in 0..n_seq {
            let base = s * seq_len;
            for h in 0..self.heads {
                let cols = h * dk..(h + 1) * dk;
                for i in 0..seq_len {
                    let offset = ((s * self.heads + h) * seq_len + i) * seq_len;
                    let probs = &cache.probabilities[offset..offset + seq_len];
                    let dc = d_context.row(base + i)[cols.clone()].to_vec();
                    for j in 0..=i {
                        let keep = cache.mask.as_ref().map_or(1.0, |m| m[offset + j]);
                        let v = &cache.value.row(base + j)[cols.clone()];
                        d_weights[j] = dc.iter().zip(v).map(|(a, b)| a * b).sum::<f64>() * keep;
                        let w = probs[j] * keep;
                        if w != 0.0 {
                            let dv = &mut d_value.row_mut(base + j)[cols.clone()];
                            for (d, c) in dv.iter_mut().zip(&dc) {
                                *d += w * c;
                            }
                        }
                    }
                    let dot: f64 = (0..=i).map(|j| probs[j] * d_weights[j]).sum();
                    for j in 0..=i {
                        d_scores[j] = probs[j] * (d_weights[j] - dot) * scale;
                    }
                    let q = cache.query.row(base + i)[cols.clone()].to_vec();
                    for j in 0..=i {
                        let ds = d_scores[j];
                        if ds == 0.0 {
                            continue;
                        }
                        let k = cache.key.row(base + j)[cols.clone()].to_vec();
                        let dq = &mut d_query.row_mut(base + i)[cols.clone()];
                        for (d, kv) in dq.iter_mut().zip(&k) {
                            *d += ds * kv;
                        }
                        let dkr = &mut d_key.row_mut(base + j)[cols.clone()];
                        for (d, qv) in dkr.iter_mut().zip(&q) {
                            *d += ds * qv;
                        }
                    }
                }
            }
        }

        let mut dx = self.query.backward(&cache.input, &d_query);
        let dx_key = self.key.backward(&cache.input, &d_key);
        let dx_value = self.value.backward(&cache.input, &d_value);
        for ((a, b), c) in dx
            .as_mut_slice()
            .iter_mut()
            .zip(dx_key.as_slice())
            .zip(dx_value.as_slice())
        {
            *a += b + c;
        }
        dx
    }

    pub(crate) fn reset_gradients(&mut self, reallocate: bool) {
        for dense in self.projections_mut() {
            dense.reset_gradients(reallocate);
        }
    }

    pub(crate) fn visit_trainable(&mut self, f: &mut dyn FnMut(&mut [f64], &[f64])) {
        for dense in self.projections_mut() {
            dense.visit_trainable(f);
        }
    }

    pub(crate) fn weights(&self) -> Vec<Vec<f64>> {
        self.projections()
            .iter()
            .flat_map(|dense| dense.weights())
            .collect()
    }

    pub(crate) fn weight_lengths(&self) -> Vec<usize> {
        self.projections()
            .iter()
            .flat_map(|dense| dense.weight_lengths())
            .collect()
    }

    pub(crate) fn load_weights(&mut self, arrays: &[Vec<f64>]) {
        for (dense, chunk) in self.projections_mut().into_iter().zip(arrays.chunks(2)) {
            dense.load_weights(chunk);
        }
    }

    pub(crate) fn parameter_count(&self) -> usize {
        self.projections().iter().map(|d| d.parameter_count()).sum()
    }

    #[cfg(test)]
    pub(crate) fn disable_dropout(&mut self) {
        self.dropout = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sequences() -> Matrix {
        // Two sequences of length 3, width 4
        let mut rows = Vec::new();
        for s in 0..2 {
            for t in 0..3 {
                rows.push(
                    (0..4)
                        .map(|c| ((s * 7 + t * 3 + c) as f64 * 0.37).sin())
                        .collect(),
                );
            }
        }
        Matrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_attention_shape_and_head_layout() {
        let mut rng = ModelRng::from_seed(11);
        let layer = CausalSelfAttention::new(4, &mut rng);
        assert_eq!(layer.heads(), 2);
        assert_eq!(layer.key_dim(), 2);
        let y = layer.infer(&sequences(), 3);
        assert_eq!(y.shape(), (6, 4));
        assert_eq!(layer.weights().len(), 8);
    }

    #[test]
    fn test_attention_is_causal() {
        let mut rng = ModelRng::from_seed(11);
        let layer = CausalSelfAttention::new(4, &mut rng);
        let x = sequences();
        let before = layer.infer(&x, 3);
        // Perturb the last time step of the first sequence only
        let mut bumped = x.clone();
        for c in 0..4 {
            bumped.set(2, c, x.get(2, c) + 5.0);
        }
        let after = layer.infer(&bumped, 3);
        for r in [0, 1, 3, 4, 5] {
            for c in 0..4 {
                assert_relative_eq!(before.get(r, c), after.get(r, c), epsilon = 1e-12);
            }
        }
        assert!((0..4).any(|c| (before.get(2, c) - after.get(2, c)).abs() > 1e-9));
    }

    #[test]
    fn test_attention_backward_matches_finite_differences() {
        let mut rng = ModelRng::from_seed(3);
        let mut layer = CausalSelfAttention::new(4, &mut rng);
        layer.disable_dropout();
        layer.reset_gradients(true);
        let x = sequences();
        let weights: Vec<f64> = (0..4).map(|c| 0.5 - 0.3 * c as f64).collect();
        let loss = |layer: &CausalSelfAttention, m: &Matrix| -> f64 {
            let y = layer.infer(m, 3);
            (0..y.rows())
                .map(|r| {
                    y.row(r).iter().zip(&weights).map(|(a, b)| a * b).sum::<f64>()
                        * (1.0 + r as f64 * 0.1)
                })
                .sum()
        };
        let mut grad = Matrix::zeros(6, 4);
        for r in 0..6 {
            for c in 0..4 {
                grad.set(r, c, weights[c] * (1.0 + r as f64 * 0.1));
            }
        }
        let (_, cache) = layer.forward_train(&x, 3, &mut rng);
        let dx = layer.backward(&grad, &cache, 3);
        let h = 1e-6;
        for r in 0..6 {
            for c in 0..4 {
                let mut up = x.clone();
                up.set(r, c, x.get(r, c) + h);
                let mut down = x.clone();
                down.set(r, c, x.get(r, c) - h);
                let numeric = (loss(&layer, &up) - loss(&layer, &down)) / (2.0 * h);
                assert_relative_eq!(dx.get(r, c), numeric, epsilon = 1e-5);
            }
        }
    }
}
