//! Sample statistics for bound estimates.
//!
//! Bounds are reported as the sample mean of per-path values together with
//! the population standard deviation (divisor `n`).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Arithmetic mean; `0.0` for an empty slice.
///
/// # Examples
///
/// ```rust
/// use stopping_core::math::mean;
///
/// assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
/// assert_eq!(mean(&[]), 0.0);
/// ```
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor `n`); `0.0` for an empty slice.
///
/// # Examples
///
/// ```rust
/// use stopping_core::math::std_dev;
///
/// assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
/// ```
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Mean and dispersion of a sample of per-path values.
///
/// # Examples
///
/// ```rust
/// use stopping_core::math::SampleSummary;
///
/// let summary = SampleSummary::from_values(&[1.0, 3.0]);
/// assert_eq!(summary.mean, 2.0);
/// assert_eq!(summary.std_dev, 1.0);
/// assert_eq!(summary.n, 2);
/// assert!((summary.std_error() - 1.0 / 2.0_f64.sqrt()).abs() < 1e-15);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleSummary {
    /// Sample mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Number of samples.
    pub n: usize,
}

impl SampleSummary {
    /// Summarises a slice of values.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            std_dev: std_dev(values),
            n: values.len(),
        }
    }

    /// Returns the standard error of the mean, `std_dev / sqrt(n)`.
    #[inline]
    pub fn std_error(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.std_dev / (self.n as f64).sqrt()
    }

    /// Returns the 95% confidence interval half-width.
    #[inline]
    pub fn confidence_95(&self) -> f64 {
        1.96 * self.std_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std_constant() {
        let values = vec![1.5; 10];
        assert_relative_eq!(mean(&values), 1.5);
        assert_relative_eq!(std_dev(&values), 0.0);
    }

    #[test]
    fn test_std_dev_is_population() {
        // Sample (n - 1) would give sqrt(2)
        assert_relative_eq!(std_dev(&[0.0, 2.0]), 1.0);
    }

    #[test]
    fn test_summary_empty() {
        let summary = SampleSummary::from_values(&[]);
        assert_eq!(summary, SampleSummary::default());
        assert_eq!(summary.std_error(), 0.0);
    }

    #[test]
    fn test_confidence_interval() {
        let summary = SampleSummary {
            mean: 1.0,
            std_dev: 2.0,
            n: 4,
        };
        assert_relative_eq!(summary.confidence_95(), 1.96);
    }
}
