//! Element-wise activation functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use stopping_core::types::{ConfigError, Matrix};

/// Negative-side slope of the leaky rectifier.
pub const LEAKY_RELU_SLOPE: f64 = 0.3;

/// Hidden-layer activation function.
///
/// Parsed case-insensitively from the usual framework names; underscores are
/// ignored, so `"leaky_relu"`, `"LeakyRelu"` and `"leakyrelu"` are the same.
/// Deserialisation goes through the same parser.
///
/// # Examples
///
/// ```rust
/// use stopping_models::layers::Activation;
///
/// let act: Activation = "LeakyRelu".parse().unwrap();
/// assert_eq!(act, Activation::LeakyRelu);
/// assert_eq!(act.apply(-1.0), -0.3);
/// assert!("swish".parse::<Activation>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `max(0, x)`
    #[default]
    Relu,
    /// `x` for positive inputs, `0.3 x` otherwise
    LeakyRelu,
    /// `x` for positive inputs, `exp(x) - 1` otherwise
    Elu,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic function
    Sigmoid,
    /// `ln(1 + exp(x))`
    Softplus,
    /// Identity
    Linear,
}

impl Activation {
    /// Evaluates the activation at `x`.
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_RELU_SLOPE * x
                }
            }
            Self::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
            Self::Tanh => x.tanh(),
            Self::Sigmoid => sigmoid(x),
            Self::Softplus => {
                // ln(1 + e^x) without overflow for large x
                if x > 30.0 {
                    x
                } else {
                    x.exp().ln_1p()
                }
            }
            Self::Linear => x,
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    #[inline]
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Self::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::LeakyRelu => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_RELU_SLOPE
                }
            }
            Self::Elu => {
                if x > 0.0 {
                    1.0
                } else {
                    x.exp()
                }
            }
            Self::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Self::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Self::Softplus => sigmoid(x),
            Self::Linear => 1.0,
        }
    }

    /// Applies the activation to every element.
    pub fn forward(self, x: &Matrix) -> Matrix {
        let mut out = x.clone();
        for v in out.as_mut_slice() {
            *v = self.apply(*v);
        }
        out
    }

    /// Back-propagates `grad` through the activation evaluated at `input`.
    pub fn backward(self, input: &Matrix, grad: &Matrix) -> Matrix {
        let mut out = grad.clone();
        for (g, &x) in out.as_mut_slice().iter_mut().zip(input.as_slice()) {
            *g *= self.derivative(x);
        }
        out
    }

    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::LeakyRelu => "leaky_relu",
            Self::Elu => "elu",
            Self::Tanh => "tanh",
            Self::Sigmoid => "sigmoid",
            Self::Softplus => "softplus",
            Self::Linear => "linear",
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "relu" => Ok(Self::Relu),
            "leakyrelu" => Ok(Self::LeakyRelu),
            "elu" => Ok(Self::Elu),
            "tanh" => Ok(Self::Tanh),
            "sigmoid" => Ok(Self::Sigmoid),
            "softplus" => Ok(Self::Softplus),
            "linear" | "identity" => Ok(Self::Linear),
            _ => Err(ConfigError::UnknownActivation(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Activation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [Activation; 7] = [
        Activation::Relu,
        Activation::LeakyRelu,
        Activation::Elu,
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::Softplus,
        Activation::Linear,
    ];

    #[test]
    fn test_parse_names() {
        assert_eq!("relu".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!(
            "leaky_relu".parse::<Activation>().unwrap(),
            Activation::LeakyRelu
        );
        assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert_eq!(
            "mish".parse::<Activation>(),
            Err(ConfigError::UnknownActivation("mish".to_string()))
        );
    }

    #[test]
    fn test_name_round_trip() {
        for act in ALL {
            assert_eq!(act.name().parse::<Activation>().unwrap(), act);
        }
    }

    #[test]
    fn test_deserialize_accepts_framework_names() {
        let act: Activation = serde_json::from_str("\"LeakyRelu\"").unwrap();
        assert_eq!(act, Activation::LeakyRelu);
        for act in ALL {
            let json = serde_json::to_string(&act).unwrap();
            assert_eq!(json, format!("\"{}\"", act.name()));
            assert_eq!(serde_json::from_str::<Activation>(&json).unwrap(), act);
        }
        assert!(serde_json::from_str::<Activation>("\"swish\"").is_err());
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = 1e-6;
        for act in ALL {
            for &x in &[-1.7, -0.4, 0.3, 2.1] {
                let numeric = (act.apply(x + h) - act.apply(x - h)) / (2.0 * h);
                assert_relative_eq!(act.derivative(x), numeric, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_softplus_large_input() {
        assert_relative_eq!(Activation::Softplus.apply(100.0), 100.0);
        assert_relative_eq!(Activation::Softplus.apply(0.0), 2.0_f64.ln());
    }
}
