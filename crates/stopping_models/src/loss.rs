//! Training losses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stopping_core::types::ConfigError;

/// Loss minimised during training.
///
/// Supervised losses compare predictions against targets. `DualMaxGap` is
/// the pathwise maximum of payoff minus martingale used by the dual network;
/// it has no supervised form and is rejected when compiling a regressor.
///
/// # Examples
///
/// ```rust
/// use stopping_models::loss::LossKind;
///
/// let loss: LossKind = "mae".parse().unwrap();
/// let (value, grad) = loss.supervised(&[1.0, 3.0], &[2.0, 2.0]).unwrap();
/// assert_eq!(value, 1.0);
/// assert_eq!(grad, vec![-0.5, 0.5]);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// Mean squared error
    #[default]
    MeanSquaredError,
    /// Mean absolute error
    MeanAbsoluteError,
    /// Huber loss with threshold `delta`
    Huber {
        /// Quadratic-to-linear threshold
        delta: f64,
    },
    /// Pathwise maximum gap between payoff and martingale
    DualMaxGap,
}

impl LossKind {
    /// Returns true for losses computed against targets.
    pub fn is_supervised(&self) -> bool {
        !matches!(self, Self::DualMaxGap)
    }

    /// Returns false for parameters that cannot define a loss.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Huber { delta } => delta.is_finite() && *delta > 0.0,
            _ => true,
        }
    }

    /// Mean loss and its gradient with respect to each prediction.
    ///
    /// Returns `None` for `DualMaxGap` or when lengths differ.
    pub fn supervised(&self, predictions: &[f64], targets: &[f64]) -> Option<(f64, Vec<f64>)> {
        if predictions.len() != targets.len() || !self.is_supervised() {
            return None;
        }
        let n = predictions.len().max(1) as f64;
        let mut total = 0.0;
        let grad = predictions
            .iter()
            .zip(targets)
            .map(|(p, y)| {
                let e = p - y;
                let (value, slope) = match *self {
                    Self::MeanSquaredError => (e * e, 2.0 * e),
                    Self::MeanAbsoluteError => (e.abs(), sign(e)),
                    Self::Huber { delta } => {
                        if e.abs() <= delta {
                            (0.5 * e * e, e)
                        } else {
                            (delta * (e.abs() - 0.5 * delta), delta * sign(e))
                        }
                    }
                    Self::DualMaxGap => (0.0, 0.0),
                };
                total += value;
                slope / n
            })
            .collect();
        Some((total / n, grad))
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MeanSquaredError => "mse",
            Self::MeanAbsoluteError => "mae",
            Self::Huber { .. } => "huber",
            Self::DualMaxGap => "dual_max_gap",
        }
    }
}

#[inline]
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Mean absolute error, the metric reported alongside every loss.
pub fn mean_absolute_error(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, y)| (p - y).abs())
        .sum::<f64>()
        / predictions.len() as f64
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mse" | "mean_squared_error" => Ok(Self::MeanSquaredError),
            "mae" | "mean_absolute_error" => Ok(Self::MeanAbsoluteError),
            "huber" => Ok(Self::Huber { delta: 1.0 }),
            "dual" | "dual_max_gap" => Ok(Self::DualMaxGap),
            _ => Err(ConfigError::UnknownLoss(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mse_value_and_gradient() {
        let (value, grad) = LossKind::MeanSquaredError
            .supervised(&[1.0, 2.0], &[0.0, 4.0])
            .unwrap();
        assert_relative_eq!(value, 2.5);
        assert_eq!(grad, vec![1.0, -2.0]);
    }

    #[test]
    fn test_huber_switches_regime() {
        let loss = LossKind::Huber { delta: 1.0 };
        let (value, grad) = loss.supervised(&[0.5, 3.0], &[0.0, 0.0]).unwrap();
        assert_relative_eq!(value, (0.125 + 2.5) / 2.0);
        assert_eq!(grad, vec![0.25, 0.5]);
    }

    #[test]
    fn test_dual_loss_has_no_supervised_form() {
        assert!(LossKind::DualMaxGap.supervised(&[1.0], &[1.0]).is_none());
        assert!(!LossKind::DualMaxGap.is_supervised());
    }

    #[test]
    fn test_parse_and_reject() {
        assert_eq!("MSE".parse::<LossKind>().unwrap(), LossKind::MeanSquaredError);
        assert_eq!(
            "mean_absolute_error".parse::<LossKind>().unwrap(),
            LossKind::MeanAbsoluteError
        );
        assert!(matches!(
            "hinge".parse::<LossKind>(),
            Err(ConfigError::UnknownLoss(_))
        ));
        assert!(!LossKind::Huber { delta: 0.0 }.is_well_formed());
    }

    #[test]
    fn test_mean_absolute_error_metric() {
        assert_relative_eq!(mean_absolute_error(&[1.0, -1.0], &[0.0, 0.0]), 1.0);
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
    }
}
