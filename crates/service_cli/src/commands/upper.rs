//! Upper bound command implementation
//!
//! Trains the dual martingale network and evaluates the pathwise maximum on
//! the test paths.

use std::path::Path;
use stopping_models::TrainableModel;
use stopping_pricing::DualEngine;
use tracing::info;

use super::{ensure_dir, print_table, write_report, BoundReport};
use crate::config::RunConfig;
use crate::data::RunData;
use crate::{CliError, Result};

/// File name of the saved dual network
pub const DUAL_NETWORK_FILE: &str = "dual_network.json";

/// Run the upper bound command
pub fn run(config: &RunConfig, data: &RunData, output_dir: Option<&Path>) -> Result<BoundReport> {
    let report = estimate(config, data, output_dir)?;
    print_table(std::slice::from_ref(&report));
    Ok(report)
}

pub(crate) fn estimate(
    config: &RunConfig,
    data: &RunData,
    output_dir: Option<&Path>,
) -> Result<BoundReport> {
    let steps = data.increment_steps().ok_or_else(|| {
        CliError::InvalidArgument("the upper bound needs training increments in the data file".to_string())
    })?;
    let dual_config = config.dual_config(data.train.n_paths(), steps)?;

    info!("Starting upper bound estimation...");
    info!("  Exercise dates: {}", dual_config.n_exercise());
    info!("  Simulation steps: {}", steps);
    info!("  Fitting paths: {}", dual_config.fit_paths());
    info!("  Test paths: {}", data.test.n_paths());

    let bound = DualEngine::new(dual_config).price(&data.train, &data.test)?;
    let report = BoundReport::new("upper", &bound.estimate, Some(bound.y0));

    if let Some(dir) = output_dir {
        ensure_dir(dir)?;
        let path = dir.join(DUAL_NETWORK_FILE);
        bound.network.save(&path)?;
        info!(path = %path.display(), "Saved dual network");
        write_report(dir, &report)?;
    }
    info!(
        price = report.price,
        y0 = bound.y0,
        steps = bound.n_steps_used,
        "Upper bound complete"
    );
    Ok(report)
}
