//! Continuation-value regressor.
//!
//! A feed-forward network mapping the features of a path at one exercise
//! date to a scalar estimate of the discounted continuation value. One
//! regressor is trained per exercise date by the lower-bound engine.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stopping_core::types::{Matrix, TensorError};
use tracing::{debug, warn};

use crate::compile::{compile_with_fallback, CompileState};
use crate::config::NetworkConfig;
use crate::error::ModelError;
use crate::layers::dropout::HIDDEN_DROPOUT_RATE;
use crate::layers::{Activation, BatchNorm, Dense, Dropout, Layer, LayerNorm};
use crate::loss::{mean_absolute_error, LossKind};
use crate::network::Network;
use crate::persistence::{load_artifact, save_artifact, ModelArtifact};
use crate::rng::ModelRng;
use crate::traits::TrainableModel;
use crate::training::{batch_plan, EarlyStopping, EpochRecord, FitOptions, TrainingHistory};

/// Artifact kind tag for regressors.
pub const REGRESSOR_KIND: &str = "regressor";

/// Rows per inference chunk in [`Regressor::predict`].
pub const PREDICT_CHUNK_ROWS: usize = 4096;

/// Regressor architecture.
///
/// Layout: optional input batch normalisation, then `hidden_layers` blocks
/// of (optional layer norm) → dense → activation → (optional layer norm) →
/// (optional dropout), then a linear dense unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressorArchitecture {
    /// Input feature dimension
    pub feature_dim: usize,
    /// Number of hidden blocks
    pub hidden_layers: usize,
    /// Width of each hidden block
    pub hidden_width: usize,
    /// Hidden activation
    pub activation: Activation,
    /// Batch normalisation on the input
    pub input_batch_norm: bool,
    /// Layer normalisation around hidden dense layers
    pub layer_norm: bool,
    /// L2 coefficient on dense kernels
    pub l2_regularisation: f64,
    /// Dropout after each hidden block
    pub dropout: bool,
}

impl RegressorArchitecture {
    /// Architecture over `feature_dim` inputs with hyperparameters taken
    /// from `config`.
    pub fn from_config(feature_dim: usize, config: &NetworkConfig) -> Self {
        Self {
            feature_dim,
            hidden_layers: config.layers,
            hidden_width: config.nodes,
            activation: config.activation,
            input_batch_norm: config.batch_normalization,
            layer_norm: config.layer_normalization,
            l2_regularisation: config.regularizer,
            dropout: config.dropout,
        }
    }

    /// Checks that the architecture can be built.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArchitecture`] for a zero feature
    /// dimension, zero hidden width with hidden layers, or an invalid L2
    /// coefficient.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_dim == 0 {
            return Err(ModelError::architecture("feature dimension must be positive"));
        }
        if self.hidden_layers > 0 && self.hidden_width == 0 {
            return Err(ModelError::architecture("hidden width must be positive"));
        }
        if !self.l2_regularisation.is_finite() || self.l2_regularisation < 0.0 {
            return Err(ModelError::architecture(format!(
                "L2 coefficient must be finite and non-negative, got {}",
                self.l2_regularisation
            )));
        }
        Ok(())
    }

    fn build(&self, rng: &mut ModelRng) -> Network {
        let mut network = Network::new(self.feature_dim);
        if self.input_batch_norm {
            network.push(Layer::BatchNorm(BatchNorm::new(self.feature_dim)));
        }
        let mut width = self.feature_dim;
        for _ in 0..self.hidden_layers {
            if self.layer_norm {
                network.push(Layer::LayerNorm(LayerNorm::new(width)));
            }
            network.push(Layer::Dense(Dense::new(
                width,
                self.hidden_width,
                self.l2_regularisation,
                rng,
            )));
            network.push(Layer::Activation(self.activation));
            width = self.hidden_width;
            if self.layer_norm {
                network.push(Layer::LayerNorm(LayerNorm::new(width)));
            }
            if self.dropout {
                network.push(Layer::Dropout(Dropout::new(HIDDEN_DROPOUT_RATE)));
            }
        }
        network.push(Layer::Dense(Dense::new(
            width,
            1,
            self.l2_regularisation,
            rng,
        )));
        network
    }
}

/// Scalar continuation-value regressor.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::Matrix;
/// use stopping_models::{LossKind, Regressor, RegressorArchitecture, TrainableModel};
/// use stopping_models::config::NetworkConfig;
///
/// let config = NetworkConfig::builder().layers(1).nodes(4).build().unwrap();
/// let mut model = Regressor::new(RegressorArchitecture::from_config(2, &config), 7).unwrap();
/// model.compile(1e-3, LossKind::MeanSquaredError);
///
/// let x = Matrix::from_rows(&[vec![0.1, 0.2], vec![0.3, 0.4]]).unwrap();
/// assert_eq!(model.predict(&x).len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Regressor {
    architecture: RegressorArchitecture,
    network: Network,
    state: CompileState,
    rng: ModelRng,
}

impl Regressor {
    /// Builds a freshly initialised, uncompiled regressor.
    ///
    /// # Errors
    ///
    /// See [`RegressorArchitecture::validate`].
    pub fn new(architecture: RegressorArchitecture, seed: u64) -> Result<Self, ModelError> {
        architecture.validate()?;
        let mut rng = ModelRng::from_seed(seed);
        let network = architecture.build(&mut rng);
        Ok(Self {
            architecture,
            network,
            state: CompileState::Uncompiled,
            rng,
        })
    }

    /// Loads a saved regressor. The result is uncompiled.
    ///
    /// # Errors
    ///
    /// Returns persistence errors, or weight errors if the stored weights do
    /// not match the stored architecture.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let artifact: ModelArtifact<RegressorArchitecture> = load_artifact(path, REGRESSOR_KIND)?;
        let mut model = Self::new(artifact.architecture, artifact.seed)?;
        model.network.set_weights(&artifact.network.weights())?;
        Ok(model)
    }

    /// Architecture.
    #[inline]
    pub fn architecture(&self) -> &RegressorArchitecture {
        &self.architecture
    }

    /// Underlying network.
    #[inline]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Copies every parameter from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IncompatibleWeights`] (or the per-array
    /// variant) when the architectures differ; `self` is left unchanged.
    pub fn transfer_weights(&mut self, source: &Regressor) -> Result<(), ModelError> {
        self.network.set_weights(&source.network.weights())
    }

    /// Trains on `features` (rows × feature_dim) against `targets`.
    ///
    /// Early stopping monitors the training loss. Validation metrics are
    /// recorded when `validation` is given.
    ///
    /// Returns `None`, after logging, if the model is degraded or
    /// uncompiled, the data do not match the architecture, or the loss
    /// becomes non-finite.
    pub fn fit(
        &mut self,
        features: &Matrix,
        targets: &[f64],
        validation: Option<(&Matrix, &[f64])>,
        options: &FitOptions,
    ) -> Option<TrainingHistory> {
        let Self {
            network,
            state,
            rng,
            ..
        } = self;
        let compiled = match state {
            CompileState::Ready(compiled) => compiled,
            CompileState::Degraded { reason } => {
                warn!(reason = %reason, "Regressor is degraded; skipping fit");
                return None;
            }
            CompileState::Uncompiled => {
                warn!("Regressor is not compiled; skipping fit");
                return None;
            }
        };
        if let Err(e) = check_data(network.input_width(), features, targets) {
            warn!(error = %e, "Training skipped due to runtime error");
            return None;
        }
        if let Some((x, y)) = validation {
            if let Err(e) = check_data(network.input_width(), x, y) {
                warn!(error = %e, "Training skipped due to invalid validation set");
                return None;
            }
        }

        let reallocate = compiled.mode.reallocates();
        let n = features.rows() as f64;
        let mut history = TrainingHistory::default();
        let mut stopping = EarlyStopping::new(options.patience);

        for epoch in 0..options.epochs {
            let mut total_loss = 0.0;
            let mut total_mae = 0.0;
            for batch in batch_plan(features.rows(), options.batch_size, options.shuffle, rng) {
                let x = match features.gather_rows(&batch) {
                    Ok(x) => x,
                    Err(e) => {
                        warn!(error = %e, "Training skipped due to runtime error");
                        return None;
                    }
                };
                let y: Vec<f64> = batch.iter().map(|&i| targets[i]).collect();

                network.reset_gradients(reallocate);
                let (output, trace) = network.forward_train(&x, 1, rng);
                let (loss, grad) = compiled.loss.supervised(output.as_slice(), &y)?;
                network.backward(&Matrix::column_vector(grad), trace, 1);
                network.add_regularisation_gradients();
                let penalty = network.regularisation_penalty();
                compiled.optimiser.step(network);

                let weight = batch.len() as f64;
                total_loss += (loss + penalty) * weight;
                total_mae += mean_absolute_error(output.as_slice(), &y) * weight;
            }
            let loss = total_loss / n;
            let mae = total_mae / n;
            if !loss.is_finite() {
                warn!(epoch, "Training skipped due to non-finite loss");
                return None;
            }

            let (val_loss, val_mae) = match validation {
                Some((x, y)) if x.rows() > 0 => {
                    let predictions = network.infer(x, 1).ok()?.into_vec();
                    let (value, _) = compiled.loss.supervised(&predictions, y)?;
                    (
                        Some(value + network.regularisation_penalty()),
                        Some(mean_absolute_error(&predictions, y)),
                    )
                }
                _ => (None, None),
            };
            debug!(epoch, loss, mae, ?val_loss, "Regressor epoch");
            history.epochs.push(EpochRecord {
                loss,
                mae,
                val_loss,
                val_mae,
            });
            if stopping.update(loss) {
                debug!(epoch, best = stopping.best(), "Early stopping");
                history.stopped_early = true;
                break;
            }
        }
        Some(history)
    }

    /// One prediction per row.
    ///
    /// Returns zeros, after logging, if the model is degraded or the
    /// feature width does not match.
    pub fn predict(&self, features: &Matrix) -> Vec<f64> {
        if self.state.is_degraded() {
            warn!("Regressor is degraded; returning zero predictions");
            return vec![0.0; features.rows()];
        }
        match self
            .network
            .infer_chunked(features, 1, PREDICT_CHUNK_ROWS)
        {
            Ok(output) => output.into_vec(),
            Err(e) => {
                warn!(error = %e, "Prediction failed; returning zero predictions");
                vec![0.0; features.rows()]
            }
        }
    }

    /// Predictions as a `(rows, 1)` matrix.
    pub fn predict_matrix(&self, features: &Matrix) -> Matrix {
        Matrix::column_vector(self.predict(features))
    }
}

fn check_data(width: usize, features: &Matrix, targets: &[f64]) -> Result<(), TensorError> {
    if features.cols() != width {
        return Err(TensorError::ShapeMismatch {
            axis: "feature",
            left: features.cols(),
            right: width,
        });
    }
    if features.rows() != targets.len() || features.rows() == 0 {
        return Err(TensorError::ShapeMismatch {
            axis: "row",
            left: features.rows(),
            right: targets.len(),
        });
    }
    Ok(())
}

impl TrainableModel for Regressor {
    fn kind(&self) -> &'static str {
        REGRESSOR_KIND
    }

    fn compile(&mut self, learning_rate: f64, loss: LossKind) {
        self.state = compile_with_fallback(
            REGRESSOR_KIND,
            learning_rate,
            loss,
            self.network.parameter_count(),
            LossKind::is_supervised,
        );
    }

    fn compile_state(&self) -> &CompileState {
        &self.state
    }

    fn get_weights(&self) -> Vec<Vec<f64>> {
        self.network.weights()
    }

    fn set_weights(&mut self, weights: &[Vec<f64>]) -> Result<(), ModelError> {
        self.network.set_weights(weights)
    }

    fn parameter_count(&self) -> usize {
        self.network.parameter_count()
    }

    fn summary(&self) -> String {
        self.network.summary(REGRESSOR_KIND)
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        let artifact = ModelArtifact::new(
            REGRESSOR_KIND,
            self.rng.seed(),
            self.architecture.clone(),
            self.network.clone(),
        );
        save_artifact(path, &artifact)
    }
}
