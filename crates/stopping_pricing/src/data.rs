//! Sample sets passed to the engines.

use stopping_core::types::{Matrix, PathTensor, TensorError};

use crate::error::EngineError;

/// Features, payoffs and (optionally) Brownian increments for one set of
/// simulated paths.
///
/// The lower-bound engine ignores `increments`; the upper-bound engine
/// requires them.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet {
    /// Path features, `paths × (N + 1) × D`
    pub features: PathTensor,
    /// Payoffs per path and time step
    pub payoffs: Matrix,
    /// Brownian increments, `paths × N`
    pub increments: Option<Matrix>,
}

impl SampleSet {
    /// Bundles a sample set, checking that every tensor has the same number
    /// of paths.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Tensor`] on a path-count mismatch.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stopping_core::types::{Matrix, PathTensor};
    /// use stopping_pricing::SampleSet;
    ///
    /// let features = PathTensor::zeros(4, 3, 1);
    /// let payoffs = Matrix::zeros(4, 3);
    /// assert!(SampleSet::new(features.clone(), payoffs, None).is_ok());
    /// assert!(SampleSet::new(features, Matrix::zeros(5, 3), None).is_err());
    /// ```
    pub fn new(
        features: PathTensor,
        payoffs: Matrix,
        increments: Option<Matrix>,
    ) -> Result<Self, EngineError> {
        let paths = features.n_paths();
        check_paths("payoff path", payoffs.rows(), paths)?;
        if let Some(dw) = &increments {
            check_paths("increment path", dw.rows(), paths)?;
        }
        Ok(Self {
            features,
            payoffs,
            increments,
        })
    }

    /// Number of paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.features.n_paths()
    }

    /// Number of simulation steps `N` implied by the feature time axis.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.features.n_steps()
    }

    /// Increments, or an error naming the sample set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingIncrements`] when absent.
    pub fn require_increments(&self, set: &'static str) -> Result<&Matrix, EngineError> {
        self.increments
            .as_ref()
            .ok_or(EngineError::MissingIncrements(set))
    }
}

fn check_paths(axis: &'static str, rows: usize, paths: usize) -> Result<(), EngineError> {
    if rows != paths {
        return Err(TensorError::ShapeMismatch {
            axis,
            left: rows,
            right: paths,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_mismatch_rejected() {
        let result = SampleSet::new(
            PathTensor::zeros(3, 4, 2),
            Matrix::zeros(3, 4),
            Some(Matrix::zeros(2, 3)),
        );
        assert!(matches!(
            result,
            Err(EngineError::Tensor(TensorError::ShapeMismatch {
                axis: "increment path",
                ..
            }))
        ));
    }

    #[test]
    fn test_require_increments() {
        let set = SampleSet::new(PathTensor::zeros(2, 3, 1), Matrix::zeros(2, 3), None).unwrap();
        assert_eq!(set.n_steps(), 2);
        assert!(matches!(
            set.require_increments("test"),
            Err(EngineError::MissingIncrements("test"))
        ));
    }
}
