//! Network hyperparameters shared by the regressor and the dual network.

use serde::{Deserialize, Serialize};
use stopping_core::types::ConfigError;

use crate::layers::Activation;

/// Hyperparameters describing a network family.
///
/// The regressor uses `nodes` as its hidden width; the dual network widens
/// its trunk to `nodes + feature_dim`.
///
/// # Examples
///
/// ```rust
/// use stopping_models::config::NetworkConfig;
/// use stopping_models::layers::Activation;
///
/// let config = NetworkConfig::builder()
///     .layers(2)
///     .nodes(16)
///     .activation(Activation::Tanh)
///     .build()
///     .unwrap();
/// assert_eq!(config.nodes, 16);
/// assert!(NetworkConfig::builder().nodes(0).build().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of hidden blocks
    pub layers: usize,
    /// Hidden width
    pub nodes: usize,
    /// Hidden activation
    pub activation: Activation,
    /// Batch normalisation on the input
    pub batch_normalization: bool,
    /// Layer normalisation around hidden blocks
    pub layer_normalization: bool,
    /// L2 coefficient on dense kernels
    pub regularizer: f64,
    /// Dropout after hidden blocks
    pub dropout: bool,
    /// Causal self-attention in the dual trunk
    pub attention: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            layers: 3,
            nodes: 64,
            activation: Activation::Relu,
            batch_normalization: false,
            layer_normalization: false,
            regularizer: 0.0,
            dropout: false,
            attention: false,
        }
    }
}

impl NetworkConfig {
    /// Creates a builder initialised with defaults.
    pub fn builder() -> NetworkConfigBuilder {
        NetworkConfigBuilder {
            config: Self::default(),
        }
    }

    /// Validates the hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] if `nodes` is zero or
    /// `regularizer` is negative or non-finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::invalid("nodes", "must be positive"));
        }
        if !self.regularizer.is_finite() || self.regularizer < 0.0 {
            return Err(ConfigError::invalid(
                "regularizer",
                format!("must be finite and non-negative, got {}", self.regularizer),
            ));
        }
        Ok(())
    }
}

/// Builder for [`NetworkConfig`].
#[derive(Clone, Debug)]
pub struct NetworkConfigBuilder {
    config: NetworkConfig,
}

impl NetworkConfigBuilder {
    /// Sets the number of hidden blocks.
    pub fn layers(mut self, layers: usize) -> Self {
        self.config.layers = layers;
        self
    }

    /// Sets the hidden width.
    pub fn nodes(mut self, nodes: usize) -> Self {
        self.config.nodes = nodes;
        self
    }

    /// Sets the hidden activation.
    pub fn activation(mut self, activation: Activation) -> Self {
        self.config.activation = activation;
        self
    }

    /// Enables input batch normalisation.
    pub fn batch_normalization(mut self, enabled: bool) -> Self {
        self.config.batch_normalization = enabled;
        self
    }

    /// Enables layer normalisation.
    pub fn layer_normalization(mut self, enabled: bool) -> Self {
        self.config.layer_normalization = enabled;
        self
    }

    /// Sets the L2 coefficient.
    pub fn regularizer(mut self, regularizer: f64) -> Self {
        self.config.regularizer = regularizer;
        self
    }

    /// Enables dropout.
    pub fn dropout(mut self, enabled: bool) -> Self {
        self.config.dropout = enabled;
        self
    }

    /// Enables causal self-attention in the dual trunk.
    pub fn attention(mut self, enabled: bool) -> Self {
        self.config.attention = enabled;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// See [`NetworkConfig::validate`].
    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layers, 3);
        assert_eq!(config.nodes, 64);
    }

    #[test]
    fn test_rejects_negative_regularizer() {
        let err = NetworkConfig::builder().regularizer(-0.1).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "regularizer",
                ..
            }
        ));
    }

    #[test]
    fn test_deserialise_partial_with_defaults() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{"nodes": 8, "activation": "tanh", "attention": true}"#)
                .unwrap();
        assert_eq!(config.nodes, 8);
        assert_eq!(config.layers, 3);
        assert_eq!(config.activation, Activation::Tanh);
        assert!(config.attention);
    }
}
