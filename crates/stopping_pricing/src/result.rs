//! Bound estimates returned by the engines.
//!
//! Engines hand their trained models to the caller inside these results;
//! persisting them is the caller's responsibility.

use stopping_core::math::SampleSummary;
use stopping_models::training::TrainingHistory;
use stopping_models::{DualNetwork, Regressor};

/// Per-date record of the backward induction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DateReport {
    /// Exercise-date index `k - 1` whose features were regressed on
    pub date: usize,
    /// Paths passed to `fit` (training split only)
    pub paths_used: usize,
    /// Whether weights were transferred from the next date's regressor
    pub warm_started: bool,
    /// Epoch budget for this date
    pub epochs_budgeted: usize,
    /// Date skipped for lack of in-the-money paths
    pub skipped: bool,
    /// Training history, when training ran
    pub history: Option<TrainingHistory>,
}

/// Lower-bound estimate from the regression-based stopping rule.
#[derive(Clone, Debug)]
pub struct LowerBound {
    /// Discounted realised payoffs on the test paths
    pub estimate: SampleSummary,
    /// Regressor per date `0..N1-1`; `None` where the date was skipped
    pub regressors: Vec<Option<Regressor>>,
    /// Backward-induction records, in processing order
    pub reports: Vec<DateReport>,
}

impl LowerBound {
    /// Lower-bound price.
    #[inline]
    pub fn price(&self) -> f64 {
        self.estimate.mean
    }

    /// Number of skipped dates.
    pub fn skipped_dates(&self) -> usize {
        self.reports.iter().filter(|r| r.skipped).count()
    }
}

/// Upper-bound estimate from the dual martingale network.
#[derive(Clone, Debug)]
pub struct UpperBound {
    /// Mean of the loss model's per-path output on the test paths
    pub y0: f64,
    /// Pathwise maxima of payoff minus martingale on the test paths
    pub estimate: SampleSummary,
    /// Trained network
    pub network: DualNetwork,
    /// Grid indices at which the test maximum was taken
    pub indices: Vec<usize>,
    /// Number of simulation steps actually used
    pub n_steps_used: usize,
    /// Training history, when training ran
    pub history: Option<TrainingHistory>,
}

impl UpperBound {
    /// Upper-bound price.
    #[inline]
    pub fn price(&self) -> f64 {
        self.estimate.mean
    }
}
