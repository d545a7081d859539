//! Dual martingale network for the upper bound.
//!
//! A trunk network maps the features of each path at each time step to a
//! scalar control `h`. The martingale rule is the discrete stochastic
//! integral of the control against the Brownian increments,
//! `rule[t] = Σ_{s≤t} h[s]·dW[s]`, and the self-supervised loss is the
//! pathwise maximum over exercise dates of payoff minus rule, averaged over
//! paths. Minimising it tightens the dual upper bound.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stopping_core::math::mean;
use stopping_core::types::{rule_indices, Matrix, PathTensor, TensorError};
use tracing::{debug, warn};

use crate::compile::{compile_with_fallback, CompileState};
use crate::config::NetworkConfig;
use crate::error::ModelError;
use crate::layers::dropout::HIDDEN_DROPOUT_RATE;
use crate::layers::{
    Activation, BatchNorm, CausalSelfAttention, Dense, Dropout, Layer, LayerNorm,
};
use crate::loss::LossKind;
use crate::network::Network;
use crate::persistence::{load_artifact, save_artifact, ModelArtifact};
use crate::rng::ModelRng;
use crate::traits::TrainableModel;
use crate::training::{batch_plan, EarlyStopping, EpochRecord, FitOptions, TrainingHistory};

/// Artifact kind tag for dual networks.
pub const DUAL_KIND: &str = "dual_network";

/// Paths per inference chunk in [`DualNetwork::predict`].
pub const PREDICT_CHUNK_PATHS: usize = 256;

/// Dual network architecture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DualArchitecture {
    /// Number of grid points including time zero, `N1 + 1`
    pub n_exercise: usize,
    /// Number of time points of the training paths, `N + 1`
    pub n_times: usize,
    /// Number of trunk blocks
    pub hidden_layers: usize,
    /// Trunk width
    pub width: usize,
    /// Input feature dimension
    pub feature_dim: usize,
    /// Trunk activation
    pub activation: Activation,
    /// Batch normalisation on the input
    pub batch_norm: bool,
    /// L2 coefficient on dense kernels
    pub l2_regularisation: f64,
    /// Dropout after each later block
    pub dropout: bool,
    /// Causal self-attention in each later block
    pub attention: bool,
    /// Layer normalisation around each later block
    pub layer_norm: bool,
}

impl DualArchitecture {
    /// Architecture with trunk width `config.nodes + feature_dim`.
    pub fn from_config(
        n_exercise: usize,
        n_times: usize,
        feature_dim: usize,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            n_exercise,
            n_times,
            hidden_layers: config.layers,
            width: config.nodes + feature_dim,
            feature_dim,
            activation: config.activation,
            batch_norm: config.batch_normalization,
            l2_regularisation: config.regularizer,
            dropout: config.dropout,
            attention: config.attention,
            layer_norm: config.layer_normalization,
        }
    }

    /// Checks that the architecture can be built.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArchitecture`] for a zero feature
    /// dimension or width, fewer than two time points or grid points, no
    /// trunk blocks, or an invalid L2 coefficient.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_dim == 0 {
            return Err(ModelError::architecture("feature dimension must be positive"));
        }
        if self.n_times < 2 {
            return Err(ModelError::architecture(format!(
                "need at least two time points, got {}",
                self.n_times
            )));
        }
        if self.n_exercise < 2 {
            return Err(ModelError::architecture(format!(
                "need at least two grid points, got {}",
                self.n_exercise
            )));
        }
        if self.hidden_layers == 0 || self.width == 0 {
            return Err(ModelError::architecture("trunk needs at least one block of positive width"));
        }
        if !self.l2_regularisation.is_finite() || self.l2_regularisation < 0.0 {
            return Err(ModelError::architecture(format!(
                "L2 coefficient must be finite and non-negative, got {}",
                self.l2_regularisation
            )));
        }
        Ok(())
    }

    /// Indices into the rule tensor at which the loss is evaluated.
    pub fn loss_indices(&self) -> Vec<usize> {
        rule_indices(self.n_exercise - 1, self.n_times - 1)
    }

    fn build(&self, rng: &mut ModelRng) -> Network {
        let q = self.width;
        let mut network = Network::new(self.feature_dim);
        if self.batch_norm {
            network.push(Layer::BatchNorm(BatchNorm::new(self.feature_dim)));
        }
        network.push(Layer::Dense(Dense::new(
            self.feature_dim,
            q,
            self.l2_regularisation,
            rng,
        )));
        network.push(Layer::Activation(self.activation));
        for _ in 1..self.hidden_layers {
            if self.layer_norm {
                network.push(Layer::LayerNorm(LayerNorm::new(q)));
            }
            if self.attention {
                network.push(Layer::Attention(CausalSelfAttention::new(q, rng)));
            }
            network.push(Layer::Dense(Dense::new(q, q, self.l2_regularisation, rng)));
            network.push(Layer::Activation(self.activation));
            if self.layer_norm {
                network.push(Layer::LayerNorm(LayerNorm::new(q)));
            }
            if self.dropout {
                network.push(Layer::Dropout(Dropout::new(HIDDEN_DROPOUT_RATE)));
            }
        }
        network.push(Layer::Dense(Dense::new(q, 1, self.l2_regularisation, rng)));
        network
    }
}

/// Inputs of one dual training or evaluation pass.
///
/// `payoffs` and `increments` have one row per path; their first
/// `n_times - 1` columns are used.
#[derive(Clone, Copy, Debug)]
pub struct DualBatch<'a> {
    /// Path features, `paths × n_times × feature_dim`
    pub features: &'a PathTensor,
    /// Payoffs per path and time step
    pub payoffs: &'a Matrix,
    /// Brownian increments per path and time step
    pub increments: &'a Matrix,
}

impl<'a> DualBatch<'a> {
    /// Bundles the three inputs, checking that they agree on the path axis.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Shape`] if the path counts differ.
    pub fn new(
        features: &'a PathTensor,
        payoffs: &'a Matrix,
        increments: &'a Matrix,
    ) -> Result<Self, ModelError> {
        for (rows, axis) in [(payoffs.rows(), "payoff path"), (increments.rows(), "increment path")] {
            if rows != features.n_paths() {
                return Err(TensorError::ShapeMismatch {
                    axis,
                    left: rows,
                    right: features.n_paths(),
                }
                .into());
            }
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
}

/// Martingale rule from per-row controls (`paths * n_times` values,
/// path-major) and increments: `rule[p][t] = Σ_{s≤t} h[p][s]·dW[p][s]` for
/// `t < len`.
fn martingale_rule(controls: &[f64], increments: &Matrix, n_times: usize, len: usize) -> Matrix {
    let paths = increments.rows();
    let mut rule = Matrix::zeros(paths, len);
    for p in 0..paths {
        let dw = increments.row(p);
        let mut acc = 0.0;
        for (t, r) in rule.row_mut(p).iter_mut().enumerate() {
            acc += controls[p * n_times + t] * dw[t];
            *r = acc;
        }
    }
    rule
}

/// Per-path maximum of `payoff[i] - rule[i]` over `indices`, with the
/// position of the (first) maximiser.
fn pathwise_max_gap(payoffs: &Matrix, rule: &Matrix, indices: &[usize]) -> (Vec<f64>, Vec<usize>) {
    let mut gaps = Vec::with_capacity(rule.rows());
    let mut argmax = Vec::with_capacity(rule.rows());
    for p in 0..rule.rows() {
        let mut best = f64::NEG_INFINITY;
        let mut best_index = indices.first().copied().unwrap_or(0);
        for &i in indices {
            let gap = payoffs.get(p, i) - rule.get(p, i);
            if gap > best {
                best = gap;
                best_index = i;
            }
        }
        gaps.push(best);
        argmax.push(best_index);
    }
    (gaps, argmax)
}

/// Dual martingale network.
///
/// The trunk is shared by the loss model ([`DualNetwork::predict_loss`])
/// and the rule model ([`DualNetwork::predict`]).
#[derive(Clone, Debug)]
pub struct DualNetwork {
    architecture: DualArchitecture,
    network: Network,
    indices: Vec<usize>,
    state: CompileState,
    rng: ModelRng,
}

impl DualNetwork {
    /// Builds a freshly initialised, uncompiled network.
    ///
    /// # Errors
    ///
    /// See [`DualArchitecture::validate`].
    pub fn new(architecture: DualArchitecture, seed: u64) -> Result<Self, ModelError> {
        architecture.validate()?;
        let mut rng = ModelRng::from_seed(seed);
        let network = architecture.build(&mut rng);
        let indices = architecture.loss_indices();
        debug!(
            n_exercise = architecture.n_exercise,
            n_times = architecture.n_times,
            ?indices,
            "Built dual network"
        );
        Ok(Self {
            architecture,
            network,
            indices,
            state: CompileState::Uncompiled,
            rng,
        })
    }

    /// Loads a saved network. The result is uncompiled.
    ///
    /// # Errors
    ///
    /// Returns persistence errors, or weight errors if the stored weights do
    /// not match the stored architecture.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let artifact: ModelArtifact<DualArchitecture> = load_artifact(path, DUAL_KIND)?;
        let mut model = Self::new(artifact.architecture, artifact.seed)?;
        model.network.set_weights(&artifact.network.weights())?;
        Ok(model)
    }

    /// Starts from the weights of an earlier network of the same shape.
    ///
    /// # Errors
    ///
    /// Returns weight errors when the architectures differ.
    pub fn with_initial_weights(mut self, source: &DualNetwork) -> Result<Self, ModelError> {
        self.network.set_weights(&source.network.weights())?;
        Ok(self)
    }

    /// Architecture.
    #[inline]
    pub fn architecture(&self) -> &DualArchitecture {
        &self.architecture
    }

    /// Rule indices used by the loss.
    #[inline]
    pub fn loss_indices(&self) -> &[usize] {
        &self.indices
    }

    /// Underlying trunk.
    #[inline]
    pub fn network(&self) -> &Network {
        &self.network
    }

    fn check_batch(&self, batch: &DualBatch<'_>) -> Result<(), TensorError> {
        let arch = &self.architecture;
        if batch.features.n_features() != arch.feature_dim {
            return Err(TensorError::ShapeMismatch {
                axis: "feature",
                left: batch.features.n_features(),
                right: arch.feature_dim,
            });
        }
        if batch.features.n_times() != arch.n_times {
            return Err(TensorError::ShapeMismatch {
                axis: "time",
                left: batch.features.n_times(),
                right: arch.n_times,
            });
        }
        let steps = arch.n_times - 1;
        for (cols, axis) in [
            (batch.payoffs.cols(), "payoff time"),
            (batch.increments.cols(), "increment time"),
        ] {
            if cols < steps {
                return Err(TensorError::ShapeMismatch {
                    axis,
                    left: cols,
                    right: steps,
                });
            }
        }
        if batch.n_paths() == 0 {
            return Err(TensorError::ShapeMismatch {
                axis: "path",
                left: 0,
                right: 1,
            });
        }
        Ok(())
    }

    /// Mean dual loss over a batch, evaluated without dropout.
    fn evaluate(&self, batch: &DualBatch<'_>) -> Option<(f64, f64)> {
        let steps = self.architecture.n_times - 1;
        let x = batch.features.to_row_matrix();
        let controls = self
            .network
            .infer_chunked(&x, self.architecture.n_times, PREDICT_CHUNK_PATHS)
            .ok()?;
        let rule = martingale_rule(controls.as_slice(), batch.increments, self.architecture.n_times, steps);
        let (gaps, _) = pathwise_max_gap(batch.payoffs, &rule, &self.indices);
        let loss = mean(&gaps) + self.network.regularisation_penalty();
        let mae = mean(&gaps.iter().map(|g| g.abs()).collect::<Vec<_>>());
        Some((loss, mae))
    }

    /// Trains the trunk on the dual loss.
    ///
    /// Early stopping monitors the validation loss when `validation` is
    /// given, otherwise the training loss. The reported MAE is the mean
    /// absolute pathwise gap.
    ///
    /// Returns `None`, after logging, if the model is degraded or
    /// uncompiled, a batch does not match the architecture, or the loss
    /// becomes non-finite.
    pub fn fit(
        &mut self,
        batch: &DualBatch<'_>,
        validation: Option<&DualBatch<'_>>,
        options: &FitOptions,
    ) -> Option<TrainingHistory> {
        match &self.state {
            CompileState::Ready(_) => {}
            CompileState::Degraded { reason } => {
                warn!(reason = %reason, "Dual network is degraded; skipping fit");
                return None;
            }
            CompileState::Uncompiled => {
                warn!("Dual network is not compiled; skipping fit");
                return None;
            }
        }
        if let Err(e) = self.check_batch(batch) {
            warn!(error = %e, "Training skipped due to runtime error");
            return None;
        }
        if let Some(val) = validation {
            if let Err(e) = self.check_batch(val) {
                warn!(error = %e, "Training skipped due to invalid validation set");
                return None;
            }
        }

        let n_times = self.architecture.n_times;
        let steps = n_times - 1;
        let n = batch.n_paths() as f64;
        let mut history = TrainingHistory::default();
        let mut stopping = EarlyStopping::new(options.patience);

        for epoch in 0..options.epochs {
            let mut total_loss = 0.0;
            let mut total_mae = 0.0;
            let plan = batch_plan(batch.n_paths(), options.batch_size, options.shuffle, &mut self.rng);
            for paths in plan {
                let gathered = batch.features.gather_paths(&paths).and_then(|features| {
                    let payoffs = batch.payoffs.gather_rows(&paths)?;
                    let increments = batch.increments.gather_rows(&paths)?;
                    Ok((features, payoffs, increments))
                });
                let (features, payoffs, increments) = match gathered {
                    Ok(parts) => parts,
                    Err(e) => {
                        warn!(epoch, error = %e, "Training skipped due to runtime error");
                        return None;
                    }
                };
                let Some((loss, mae)) = self.train_step(&features, &payoffs, &increments, steps) else {
                    warn!(epoch, "Training skipped; model lost its compiled state");
                    return None;
                };
                let weight = paths.len() as f64;
                total_loss += loss * weight;
                total_mae += mae * weight;
            }
            let loss = total_loss / n;
            let mae = total_mae / n;
            if !loss.is_finite() {
                warn!(epoch, "Training skipped due to non-finite loss");
                return None;
            }
            let (val_loss, val_mae) = match validation {
                Some(val) => match self.evaluate(val) {
                    Some((l, m)) => (Some(l), Some(m)),
                    None => {
                        warn!(epoch, "Training skipped; validation loss could not be evaluated");
                        return None;
                    }
                },
                None => (None, None),
            };
            debug!(epoch, loss, mae, ?val_loss, "Dual epoch");
            history.epochs.push(EpochRecord {
                loss,
                mae,
                val_loss,
                val_mae,
            });
            if stopping.update(val_loss.unwrap_or(loss)) {
                debug!(epoch, best = stopping.best(), "Early stopping");
                history.stopped_early = true;
                break;
            }
        }
        Some(history)
    }

    /// One optimiser step on a mini-batch; returns (loss, mean |gap|).
    fn train_step(
        &mut self,
        features: &PathTensor,
        payoffs: &Matrix,
        increments: &Matrix,
        steps: usize,
    ) -> Option<(f64, f64)> {
        let Self {
            architecture,
            network,
            indices,
            state,
            rng,
        } = self;
        let CompileState::Ready(compiled) = state else {
            return None;
        };
        let n_times = architecture.n_times;
        let paths = features.n_paths();
        let scale = 1.0 / paths as f64;

        network.reset_gradients(compiled.mode.reallocates());
        let x = features.to_row_matrix();
        let (controls, trace) = network.forward_train(&x, n_times, rng);
        let rule = martingale_rule(controls.as_slice(), increments, n_times, steps);
        let (gaps, argmax) = pathwise_max_gap(payoffs, &rule, indices);

        // d(loss)/d(rule[p][argmax]) = -1/B, so d(loss)/d(h[p][s]) = -dW[p][s]/B
        // for every s up to the maximiser.
        let mut grad = Matrix::zeros(paths * n_times, 1);
        for (p, &t_star) in argmax.iter().enumerate() {
            let dw = increments.row(p);
            for s in 0..=t_star {
                grad.set(p * n_times + s, 0, -dw[s] * scale);
            }
        }
        network.backward(&grad, trace, n_times);
        network.add_regularisation_gradients();
        let penalty = network.regularisation_penalty();
        compiled.optimiser.step(network);

        let loss = mean(&gaps) + penalty;
        let mae = mean(&gaps.iter().map(|g| g.abs()).collect::<Vec<_>>());
        Some((loss, mae))
    }

    /// Rule model: the martingale at each step, `paths × (n_times - 1)`.
    ///
    /// Accepts any number of time steps. If fewer increments than steps are
    /// supplied the output is narrowed to the increments. Returns zeros of
    /// shape `paths × (n_times - 1)`, after logging, in degraded mode or on
    /// a shape mismatch.
    pub fn predict(&self, features: &PathTensor, increments: &Matrix) -> Matrix {
        let paths = features.n_paths();
        let n_times = features.n_times();
        let zeros = Matrix::zeros(paths, n_times.saturating_sub(1));
        if self.state.is_degraded() {
            warn!("Dual network is degraded; returning zero rule");
            return zeros;
        }
        if increments.rows() != paths {
            warn!(
                increments = increments.rows(),
                paths, "Increment paths do not match features; returning zero rule"
            );
            return zeros;
        }
        let mut len = n_times.saturating_sub(1);
        if increments.cols() < len {
            warn!(
                increments = increments.cols(),
                steps = len,
                "Fewer increments than time steps; narrowing rule"
            );
            len = increments.cols();
        }
        match self
            .network
            .infer_chunked(&features.to_row_matrix(), n_times.max(1), PREDICT_CHUNK_PATHS)
        {
            Ok(controls) => martingale_rule(controls.as_slice(), increments, n_times, len),
            Err(e) => {
                warn!(error = %e, "Prediction failed; returning zero rule");
                zeros
            }
        }
    }

    /// Loss model: per-path maximum of payoff minus rule over the loss
    /// indices.
    ///
    /// Indices beyond the payoff or rule width are dropped. Returns zeros,
    /// after logging, in degraded mode or when no index remains.
    pub fn predict_loss(&self, features: &PathTensor, payoffs: &Matrix, increments: &Matrix) -> Vec<f64> {
        let paths = features.n_paths();
        if self.state.is_degraded() {
            warn!("Dual network is degraded; returning zero loss");
            return vec![0.0; paths];
        }
        let rule = self.predict(features, increments);
        let indices = rule_indices(self.architecture.n_exercise - 1, rule.cols());
        let usable: Vec<usize> = indices
            .into_iter()
            .filter(|&i| i < payoffs.cols())
            .collect();
        if usable.is_empty() || payoffs.rows() != paths {
            warn!("No usable loss indices; returning zero loss");
            return vec![0.0; paths];
        }
        pathwise_max_gap(payoffs, &rule, &usable).0
    }
}

impl TrainableModel for DualNetwork {
    fn kind(&self) -> &'static str {
        DUAL_KIND
    }

    fn compile(&mut self, learning_rate: f64, loss: LossKind) {
        self.state = compile_with_fallback(
            DUAL_KIND,
            learning_rate,
            loss,
            self.network.parameter_count(),
            |l| matches!(l, LossKind::DualMaxGap),
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
        self.network.summary(DUAL_KIND)
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        let artifact = ModelArtifact::new(
            DUAL_KIND,
            self.rng.seed(),
            self.architecture.clone(),
            self.network.clone(),
        );
        save_artifact(path, &artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn architecture(attention: bool) -> DualArchitecture {
        let config = NetworkConfig::builder()
            .layers(2)
            .nodes(4)
            .attention(attention)
            .build()
            .unwrap();
        DualArchitecture::from_config(3, 5, 2, &config)
    }

    fn sample(paths: usize) -> (PathTensor, Matrix, Matrix) {
        let mut data = Vec::new();
        for p in 0..paths {
            for t in 0..5 {
                data.push(t as f64 * 0.25);
                data.push(((p * 5 + t) as f64 * 0.7).sin());
            }
        }
        let features = PathTensor::new(paths, 5, 2, data).unwrap();
        let payoffs = Matrix::from_rows(
            &(0..paths)
                .map(|p| (0..4).map(|t| ((p + t) as f64 * 0.3).cos().max(0.0)).collect())
                .collect::<Vec<Vec<f64>>>(),
        )
        .unwrap();
        let increments = Matrix::from_rows(
            &(0..paths)
                .map(|p| (0..4).map(|t| ((p * 3 + t) as f64 * 1.3).sin() * 0.5).collect())
                .collect::<Vec<Vec<f64>>>(),
        )
        .unwrap();
        (features, payoffs, increments)
    }

    #[test]
    fn test_architecture_validation() {
        let mut arch = architecture(false);
        assert_eq!(arch.width, 6);
        arch.n_times = 1;
        assert!(DualNetwork::new(arch.clone(), 0).is_err());
        arch.n_times = 5;
        arch.feature_dim = 0;
        assert!(DualNetwork::new(arch, 0).is_err());
    }

    #[test]
    fn test_loss_indices_follow_rule_policy() {
        let model = DualNetwork::new(architecture(false), 0).unwrap();
        // n_exercise - 1 = 2 indices on 4 rule points
        assert_eq!(model.loss_indices(), &[0, 2]);
    }

    #[test]
    fn test_rule_is_cumulative_integral() {
        let controls = vec![1.0, 2.0, 3.0, 9.0];
        let increments = Matrix::from_rows(&[vec![0.5, -1.0, 2.0]]).unwrap();
        let rule = martingale_rule(&controls, &increments, 4, 3);
        assert_eq!(rule.row(0), &[0.5, -1.5, 4.5]);
    }

    #[test]
    fn test_predict_shapes() {
        let (features, payoffs, increments) = sample(6);
        let model = DualNetwork::new(architecture(true), 1).unwrap();
        assert_eq!(model.predict(&features, &increments).shape(), (6, 4));
        assert_eq!(model.predict_loss(&features, &payoffs, &increments).len(), 6);
        let narrow = increments.truncate_cols(2);
        assert_eq!(model.predict(&features, &narrow).shape(), (6, 2));
    }

    #[test]
    fn test_zero_increments_give_zero_rule() {
        let (features, payoffs, _) = sample(4);
        let zeros = Matrix::zeros(4, 4);
        let model = DualNetwork::new(architecture(false), 1).unwrap();
        let rule = model.predict(&features, &zeros);
        assert!(rule.as_slice().iter().all(|&v| v == 0.0));
        let loss = model.predict_loss(&features, &payoffs, &zeros);
        for (p, value) in loss.iter().enumerate() {
            let expected = payoffs.get(p, 0).max(payoffs.get(p, 2));
            assert_relative_eq!(*value, expected);
        }
    }

    #[test]
    fn test_compile_requires_dual_loss() {
        let (features, _, increments) = sample(3);
        let mut model = DualNetwork::new(architecture(false), 1).unwrap();
        model.compile(1e-3, LossKind::MeanSquaredError);
        assert!(model.is_degraded());
        let rule = model.predict(&features, &increments);
        assert_eq!(rule.shape(), (3, 4));
        assert!(rule.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fit_reduces_dual_loss() {
        let (features, payoffs, increments) = sample(32);
        let batch = DualBatch::new(&features, &payoffs, &increments).unwrap();
        let mut model = DualNetwork::new(architecture(true), 2).unwrap();
        model.compile(1e-2, LossKind::DualMaxGap);
        let history = model
            .fit(&batch, None, &FitOptions::new(8, 30).with_patience(30))
            .unwrap();
        let losses = history.losses();
        let best = losses.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(best < losses[0]);
    }

    #[test]
    fn test_fit_rejects_mismatched_batch() {
        let (features, payoffs, increments) = sample(4);
        let short = increments.truncate_cols(2);
        let batch = DualBatch::new(&features, &payoffs, &short).unwrap();
        let mut model = DualNetwork::new(architecture(false), 2).unwrap();
        model.compile(1e-3, LossKind::DualMaxGap);
        assert!(model.fit(&batch, None, &FitOptions::new(2, 1)).is_none());
        assert!(DualBatch::new(&features, &payoffs.select_rows(0..2), &increments).is_err());
    }

    #[test]
    fn test_fit_validation_losses() {
        let (features, payoffs, increments) = sample(12);
        let fit_features = features.select_paths(0..8);
        let val_features = features.select_paths(8..12);
        let (fit_payoffs, val_payoffs) = (payoffs.select_rows(0..8), payoffs.select_rows(8..12));
        let (fit_inc, val_inc) = (increments.select_rows(0..8), increments.select_rows(8..12));
        let batch = DualBatch::new(&fit_features, &fit_payoffs, &fit_inc).unwrap();
        let val = DualBatch::new(&val_features, &val_payoffs, &val_inc).unwrap();

        let mut model = DualNetwork::new(architecture(false), 3).unwrap();
        model.compile(1e-3, LossKind::DualMaxGap);
        let history = model.fit(&batch, Some(&val), &FitOptions::new(4, 3)).unwrap();
        assert!(history.epochs.iter().all(|e| e.val_loss.is_some_and(f64::is_finite)));

        // A validation set narrower than the architecture skips training
        let short = val_inc.truncate_cols(2);
        let bad = DualBatch::new(&val_features, &val_payoffs, &short).unwrap();
        assert!(model.fit(&batch, Some(&bad), &FitOptions::new(4, 3)).is_none());
    }

    #[test]
    fn test_with_initial_weights() {
        let (features, _, increments) = sample(3);
        let source = DualNetwork::new(architecture(false), 1).unwrap();
        let model = DualNetwork::new(architecture(false), 2)
            .unwrap()
            .with_initial_weights(&source)
            .unwrap();
        assert_eq!(
            model.predict(&features, &increments),
            source.predict(&features, &increments)
        );
    }

    #[test]
    fn test_dual_gradient_matches_finite_differences() {
        // Single path, no penalty: loss is piecewise linear in the output bias
        let (features, payoffs, increments) = sample(1);
        let mut model = DualNetwork::new(architecture(false), 4).unwrap();
        model.compile(1e-3, LossKind::DualMaxGap);
        let loss_at = |m: &DualNetwork| -> f64 {
            m.predict_loss(&features, &payoffs, &increments)[0]
        };
        let base = loss_at(&model);
        let mut weights = model.get_weights();
        let last = weights.len() - 1;
        let h = 1e-7;
        weights[last][0] += h;
        let mut bumped = model.clone();
        bumped.set_weights(&weights).unwrap();
        let numeric = (loss_at(&bumped) - base) / h;

        // Analytic: -Σ_{s ≤ t*} dW[s] for the maximising index t*
        let rule = model.predict(&features, &increments);
        let (_, argmax) = pathwise_max_gap(&payoffs, &rule, model.loss_indices());
        let analytic: f64 = -(0..=argmax[0]).map(|s| increments.get(0, s)).sum::<f64>();
        assert_relative_eq!(numeric, analytic, epsilon = 1e-5);
    }
}
