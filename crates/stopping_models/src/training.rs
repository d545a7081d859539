//! Mini-batch training utilities shared by every model.
//!
//! This module provides:
//! - [`FitOptions`]: batch size, epoch budget, patience and shuffling
//! - [`EarlyStopping`]: stops after `patience` epochs without strict
//!   improvement of the monitored loss
//! - [`TrainingHistory`]: per-epoch loss and MAE, with validation values
//! - [`batch_plan`]: per-epoch mini-batch index lists

use serde::{Deserialize, Serialize};

use crate::rng::ModelRng;

/// Default early-stopping patience in epochs.
pub const DEFAULT_PATIENCE: usize = 5;

/// Options for one call to a model's `fit`.
///
/// # Examples
///
/// ```rust
/// use stopping_models::training::FitOptions;
///
/// let options = FitOptions::new(64, 10).with_patience(3);
/// assert_eq!(options.patience, 3);
/// assert!(options.shuffle);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Mini-batch size (clamped to at least 1)
    pub batch_size: usize,
    /// Maximum number of epochs
    pub epochs: usize,
    /// Early-stopping patience
    pub patience: usize,
    /// Reshuffle samples every epoch
    pub shuffle: bool,
}

impl FitOptions {
    /// Creates options with default patience and shuffling enabled.
    pub fn new(batch_size: usize, epochs: usize) -> Self {
        Self {
            batch_size,
            epochs,
            patience: DEFAULT_PATIENCE,
            shuffle: true,
        }
    }

    /// Sets the early-stopping patience.
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Enables or disables per-epoch shuffling.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Metrics of one epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Mean training loss including the regularisation penalty
    pub loss: f64,
    /// Mean absolute error on the training set
    pub mae: f64,
    /// Validation loss, if a validation set was supplied
    pub val_loss: Option<f64>,
    /// Validation mean absolute error, if a validation set was supplied
    pub val_mae: Option<f64>,
}

/// Per-epoch training record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// One record per completed epoch
    pub epochs: Vec<EpochRecord>,
    /// Whether early stopping ended training
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Number of completed epochs.
    #[inline]
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Whether no epoch completed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Training loss of the last epoch.
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.loss)
    }

    /// Training losses of every epoch.
    pub fn losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.loss).collect()
    }
}

/// Early-stopping monitor.
///
/// An epoch improves when its monitored value is strictly below the best
/// seen so far. Training stops once `patience` consecutive epochs fail to
/// improve.
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    wait: usize,
}

impl EarlyStopping {
    /// Creates a monitor.
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    /// Records an epoch value; returns true when training should stop.
    pub fn update(&mut self, value: f64) -> bool {
        if value < self.best {
            self.best = value;
            self.wait = 0;
            return false;
        }
        self.wait += 1;
        self.wait >= self.patience
    }

    /// Best value seen.
    #[inline]
    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Splits `0..n` into mini-batches, shuffled when requested.
pub fn batch_plan(
    n: usize,
    batch_size: usize,
    shuffle: bool,
    rng: &mut ModelRng,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        rng.shuffle(&mut order);
    }
    order
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_stopping_requires_strict_improvement() {
        let mut es = EarlyStopping::new(2);
        assert!(!es.update(1.0));
        assert!(!es.update(1.0)); // equal is not an improvement
        assert!(es.update(1.5));
        assert_eq!(es.best(), 1.0);
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut es = EarlyStopping::new(2);
        es.update(3.0);
        es.update(3.5);
        assert!(!es.update(2.0));
        assert!(!es.update(2.5));
        assert!(es.update(2.5));
    }

    #[test]
    fn test_early_stopping_never_improves_on_nan() {
        let mut es = EarlyStopping::new(1);
        assert!(es.update(f64::NAN));
    }

    #[test]
    fn test_batch_plan_covers_all_indices() {
        let mut rng = ModelRng::from_seed(4);
        let plan = batch_plan(10, 4, true, &mut rng);
        assert_eq!(plan.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        let mut all: Vec<usize> = plan.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_plan_unshuffled_is_ordered() {
        let mut rng = ModelRng::from_seed(4);
        let plan = batch_plan(5, 0, false, &mut rng);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan[0], vec![0]);
    }

    #[test]
    fn test_history_accessors() {
        let mut history = TrainingHistory::default();
        assert!(history.is_empty());
        history.epochs.push(EpochRecord {
            loss: 2.0,
            mae: 1.0,
            val_loss: None,
            val_mae: None,
        });
        assert_eq!(history.final_loss(), Some(2.0));
        assert_eq!(history.losses(), vec![2.0]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_batch_plan_is_partition(n in 0usize..200, batch_size in 1usize..40, seed in any::<u64>()) {
                let mut rng = ModelRng::from_seed(seed);
                let plan = batch_plan(n, batch_size, true, &mut rng);
                prop_assert_eq!(plan.len(), n.div_ceil(batch_size));
                prop_assert!(plan.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
                let mut all: Vec<usize> = plan.into_iter().flatten().collect();
                all.sort_unstable();
                prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
            }
        }
    }
}
