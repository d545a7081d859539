//! Adam optimiser.
//!
//! Uses the bias-corrected step size
//! `lr_t = lr · sqrt(1 − β₂ᵗ) / (1 − β₁ᵗ)` and updates
//! `θ ← θ − lr_t · m / (sqrt(v) + ε)`.

use crate::network::Network;

/// First-moment decay.
pub const ADAM_BETA1: f64 = 0.9;
/// Second-moment decay.
pub const ADAM_BETA2: f64 = 0.999;
/// Denominator offset.
pub const ADAM_EPSILON: f64 = 1e-7;

/// Adam optimiser state for one network.
///
/// Moment buffers are allocated lazily on the first step, one per trainable
/// array in visiting order.
#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f64,
    iterations: u64,
    first_moments: Vec<Vec<f64>>,
    second_moments: Vec<Vec<f64>>,
}

impl Adam {
    /// Creates an optimiser with the given learning rate.
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            iterations: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    /// Learning rate.
    #[inline]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of steps taken.
    #[inline]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Applies one update using the gradients currently held by `network`.
    pub fn step(&mut self, network: &mut Network) {
        self.iterations += 1;
        let t = self.iterations as i32;
        let step_size = self.learning_rate * (1.0 - ADAM_BETA2.powi(t)).sqrt()
            / (1.0 - ADAM_BETA1.powi(t));

        let first = &mut self.first_moments;
        let second = &mut self.second_moments;
        let mut slot = 0;
        network.visit_trainable(&mut |params: &mut [f64], grads: &[f64]| {
            if first.len() <= slot {
                first.push(vec![0.0; params.len()]);
                second.push(vec![0.0; params.len()]);
            }
            let m = &mut first[slot];
            let v = &mut second[slot];
            for (((p, g), mi), vi) in params.iter_mut().zip(grads).zip(m.iter_mut()).zip(v.iter_mut())
            {
                *mi = ADAM_BETA1 * *mi + (1.0 - ADAM_BETA1) * g;
                *vi = ADAM_BETA2 * *vi + (1.0 - ADAM_BETA2) * g * g;
                *p -= step_size * *mi / (vi.sqrt() + ADAM_EPSILON);
            }
            slot += 1;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Dense, Layer};
    use crate::rng::ModelRng;
    use approx::assert_relative_eq;
    use stopping_core::types::Matrix;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut rng = ModelRng::from_seed(0);
        let mut network = Network::new(1);
        network.push(Layer::Dense(Dense::new(1, 1, 0.0, &mut rng)));
        network
            .set_weights(&[vec![1.0], vec![0.0]])
            .unwrap();
        network.reset_gradients(false);
        let mut model_rng = ModelRng::from_seed(1);
        let x = Matrix::column_vector(vec![2.0]);
        let (_, trace) = network.forward_train(&x, 1, &mut model_rng);
        network.backward(&Matrix::column_vector(vec![1.0]), trace, 1);

        let mut adam = Adam::new(0.01);
        adam.step(&mut network);
        // First Adam step has magnitude ~lr for any non-zero gradient
        let weights = network.weights();
        assert_relative_eq!(weights[0][0], 1.0 - 0.01, epsilon = 1e-6);
        assert_relative_eq!(weights[1][0], -0.01, epsilon = 1e-6);
        assert_eq!(adam.iterations(), 1);
    }
}
