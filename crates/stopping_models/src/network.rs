//! Sequential layer stacks.

use serde::{Deserialize, Serialize};
use stopping_core::types::Matrix;
use tracing::debug;

use crate::error::ModelError;
use crate::layers::{Layer, LayerCache};
use crate::rng::ModelRng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Caches from one training forward pass, in layer order.
#[derive(Debug)]
pub(crate) struct ForwardTrace {
    caches: Vec<LayerCache>,
}

/// An ordered stack of layers applied to `rows × input_width` matrices.
///
/// Rows are grouped into sequences of `seq_len` consecutive rows; only
/// attention layers look across rows, and only within a sequence. Tabular
/// inputs use `seq_len = 1`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Network {
    input_width: usize,
    layers: Vec<Layer>,
}

impl Network {
    /// Creates an empty network over `input_width` features.
    pub fn new(input_width: usize) -> Self {
        Self {
            input_width,
            layers: Vec::new(),
        }
    }

    /// Appends a layer.
    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Input width.
    #[inline]
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Output width of the last layer.
    pub fn output_width(&self) -> usize {
        self.layers
            .iter()
            .fold(self.input_width, |width, layer| layer.output_width(width))
    }

    /// Layers in application order.
    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Inference pass over the whole input.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Shape`] if the column count differs from the
    /// input width or the row count is not a multiple of `seq_len`.
    pub fn infer(&self, x: &Matrix, seq_len: usize) -> Result<Matrix, ModelError> {
        self.check_input(x, seq_len)?;
        Ok(self.infer_unchecked(x, seq_len))
    }

    fn infer_unchecked(&self, x: &Matrix, seq_len: usize) -> Matrix {
        let mut current = x.clone();
        for layer in &self.layers {
            current = layer.infer(&current, seq_len);
        }
        current
    }

    /// Inference pass evaluated in chunks of `chunk_sequences` sequences.
    ///
    /// With the `parallel` feature the chunks run on the rayon pool.
    /// Chunking never changes the result: inference has no batch coupling.
    ///
    /// # Errors
    ///
    /// Same as [`Network::infer`].
    pub fn infer_chunked(
        &self,
        x: &Matrix,
        seq_len: usize,
        chunk_sequences: usize,
    ) -> Result<Matrix, ModelError> {
        self.check_input(x, seq_len)?;
        let chunk_rows = chunk_sequences.max(1) * seq_len;
        if x.rows() <= chunk_rows {
            return Ok(self.infer_unchecked(x, seq_len));
        }
        let starts: Vec<usize> = (0..x.rows()).step_by(chunk_rows).collect();

        #[cfg(feature = "parallel")]
        let parts: Vec<Matrix> = starts
            .par_iter()
            .map(|&start| self.infer_unchecked(&x.select_rows(start..start + chunk_rows), seq_len))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let parts: Vec<Matrix> = starts
            .iter()
            .map(|&start| self.infer_unchecked(&x.select_rows(start..start + chunk_rows), seq_len))
            .collect();

        let cols = self.output_width();
        let mut data = Vec::with_capacity(x.rows() * cols);
        for part in parts {
            data.extend(part.into_vec());
        }
        Ok(Matrix::new(x.rows(), cols, data)?)
    }

    fn check_input(&self, x: &Matrix, seq_len: usize) -> Result<(), ModelError> {
        if x.cols() != self.input_width {
            return Err(stopping_core::types::TensorError::ShapeMismatch {
                axis: "feature",
                left: x.cols(),
                right: self.input_width,
            }
            .into());
        }
        if seq_len == 0 || x.rows() % seq_len != 0 {
            return Err(stopping_core::types::TensorError::ShapeMismatch {
                axis: "sequence",
                left: x.rows(),
                right: seq_len,
            }
            .into());
        }
        Ok(())
    }

    /// Training forward pass. The caller has validated the input shape.
    pub(crate) fn forward_train(
        &mut self,
        x: &Matrix,
        seq_len: usize,
        rng: &mut ModelRng,
    ) -> (Matrix, ForwardTrace) {
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut current = x.clone();
        for layer in &mut self.layers {
            let (next, cache) = layer.forward_train(current, seq_len, rng);
            caches.push(cache);
            current = next;
        }
        (current, ForwardTrace { caches })
    }

    /// Back-propagates `grad` through the stack, accumulating parameter
    /// gradients. Returns the input gradient.
    pub(crate) fn backward(&mut self, grad: &Matrix, trace: ForwardTrace, seq_len: usize) -> Matrix {
        let mut current = grad.clone();
        for (layer, cache) in self.layers.iter_mut().zip(&trace.caches).rev() {
            current = layer.backward(&current, cache, seq_len);
        }
        current
    }

    /// Zeroes every gradient buffer; `reallocate` drops and recreates them.
    pub(crate) fn reset_gradients(&mut self, reallocate: bool) {
        for layer in &mut self.layers {
            layer.reset_gradients(reallocate);
        }
    }

    pub(crate) fn visit_trainable(&mut self, f: &mut dyn FnMut(&mut [f64], &[f64])) {
        for layer in &mut self.layers {
            layer.visit_trainable(f);
        }
    }

    /// Sum of the L2 kernel penalties.
    pub fn regularisation_penalty(&self) -> f64 {
        self.layers.iter().map(Layer::penalty).sum()
    }

    pub(crate) fn add_regularisation_gradients(&mut self) {
        for layer in &mut self.layers {
            layer.add_penalty_gradient();
        }
    }

    /// All weight arrays in layer order.
    pub fn weights(&self) -> Vec<Vec<f64>> {
        self.layers.iter().flat_map(Layer::weights).collect()
    }

    /// Replaces every weight array.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IncompatibleWeights`] if the number of arrays
    /// differs, or [`ModelError::IncompatibleWeightArray`] for the first
    /// array with the wrong length. Nothing is modified on error.
    pub fn set_weights(&mut self, weights: &[Vec<f64>]) -> Result<(), ModelError> {
        let lengths: Vec<usize> = self.layers.iter().flat_map(Layer::weight_lengths).collect();
        if lengths.len() != weights.len() {
            return Err(ModelError::IncompatibleWeights {
                expected: lengths.len(),
                got: weights.len(),
            });
        }
        for (index, (&expected, array)) in lengths.iter().zip(weights).enumerate() {
            if array.len() != expected {
                return Err(ModelError::IncompatibleWeightArray {
                    index,
                    expected,
                    got: array.len(),
                });
            }
        }
        let mut offset = 0;
        for layer in &mut self.layers {
            let count = layer.weight_lengths().len();
            layer.load_weights(&weights[offset..offset + count]);
            offset += count;
        }
        debug!(arrays = weights.len(), "Loaded network weights");
        Ok(())
    }

    /// Total number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Human-readable layer table.
    pub fn summary(&self, name: &str) -> String {
        let mut out = format!("Model: \"{name}\"\n");
        out.push_str(&format!("{:<28}{:>14}{:>12}\n", "Layer (type)", "Output width", "Param #"));
        let mut width = self.input_width;
        for (i, layer) in self.layers.iter().enumerate() {
            width = layer.output_width(width);
            out.push_str(&format!(
                "{:<28}{:>14}{:>12}\n",
                format!("{}_{}", layer.kind(), i),
                width,
                layer.parameter_count()
            ));
        }
        out.push_str(&format!("Total params: {}\n", self.parameter_count()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Activation, Dense};

    fn small_network() -> Network {
        let mut rng = ModelRng::from_seed(9);
        let mut network = Network::new(3);
        network.push(Layer::Dense(Dense::new(3, 4, 0.0, &mut rng)));
        network.push(Layer::Activation(Activation::Tanh));
        network.push(Layer::Dense(Dense::new(4, 1, 0.0, &mut rng)));
        network
    }

    #[test]
    fn test_output_width_and_parameter_count() {
        let network = small_network();
        assert_eq!(network.output_width(), 1);
        assert_eq!(network.parameter_count(), 3 * 4 + 4 + 4 + 1);
        assert!(network.summary("demo").contains("Total params: 21"));
    }

    #[test]
    fn test_infer_rejects_wrong_width() {
        let network = small_network();
        assert!(network.infer(&Matrix::zeros(2, 2), 1).is_err());
        assert!(network.infer(&Matrix::zeros(3, 3), 2).is_err());
    }

    #[test]
    fn test_chunked_inference_matches_full() {
        let network = small_network();
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|i| vec![i as f64 * 0.1, -(i as f64) * 0.2, 1.0])
            .collect();
        let x = Matrix::from_rows(&rows).unwrap();
        let full = network.infer(&x, 1).unwrap();
        let chunked = network.infer_chunked(&x, 1, 3).unwrap();
        assert_eq!(full, chunked);
    }

    #[test]
    fn test_set_weights_validates_before_writing() {
        let mut network = small_network();
        let original = network.weights();
        let mut bad = original.clone();
        bad[2].push(0.0);
        assert!(matches!(
            network.set_weights(&bad),
            Err(ModelError::IncompatibleWeightArray { index: 2, .. })
        ));
        assert_eq!(network.weights(), original);
        assert!(matches!(
            network.set_weights(&original[..3]),
            Err(ModelError::IncompatibleWeights {
                expected: 4,
                got: 3
            })
        ));
    }
}
