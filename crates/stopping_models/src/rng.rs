//! Seeded random number generation for model initialisation and training.
//!
//! This module provides [`ModelRng`], a seeded PRNG wrapper used for
//! Glorot-uniform initialisation, per-epoch shuffling and dropout masks.
//! Identical seeds reproduce identical weights and training trajectories.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, Uniform};

/// Model random number generator.
///
/// # Examples
///
/// ```rust
/// use stopping_models::rng::ModelRng;
///
/// let mut rng1 = ModelRng::from_seed(7);
/// let mut rng2 = ModelRng::from_seed(7);
/// assert_eq!(rng1.gen_uniform(), rng2.gen_uniform());
/// ```
#[derive(Clone, Debug)]
pub struct ModelRng {
    /// The underlying PRNG instance.
    inner: StdRng,
    /// The seed used for initialisation.
    seed: u64,
}

impl ModelRng {
    /// Creates a new RNG instance initialised with the given seed.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates a single uniform random value in [0, 1).
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Fills `buffer` with Glorot-uniform draws for a kernel of shape
    /// `fan_in × fan_out`: `U(-l, l)` with `l = sqrt(6 / (fan_in + fan_out))`.
    pub fn fill_glorot_uniform(&mut self, buffer: &mut [f64], fan_in: usize, fan_out: usize) {
        let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        for value in buffer.iter_mut() {
            *value = dist.sample(&mut self.inner);
        }
    }

    /// Returns an inverted-dropout mask: each entry is `1 / (1 - rate)` with
    /// probability `1 - rate`, and 0 otherwise.
    pub fn dropout_mask(&mut self, len: usize, rate: f64) -> Vec<f64> {
        let keep = (1.0 - rate).clamp(0.0, 1.0);
        if keep <= 0.0 {
            return vec![0.0; len];
        }
        let scale = 1.0 / keep;
        match Bernoulli::new(keep) {
            Ok(dist) => (0..len)
                .map(|_| if dist.sample(&mut self.inner) { scale } else { 0.0 })
                .collect(),
            Err(_) => vec![1.0; len],
        }
    }

    /// Shuffles `indices` in place.
    #[inline]
    pub fn shuffle(&mut self, indices: &mut [usize]) {
        indices.shuffle(&mut self.inner);
    }
}
