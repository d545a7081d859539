//! Lower bound command implementation
//!
//! Trains the regression stopping rule and evaluates it on the test paths.

use std::path::Path;
use stopping_models::TrainableModel;
use stopping_pricing::{LongstaffSchwartzEngine, LowerBound};
use tracing::info;

use super::{ensure_dir, print_table, write_report, BoundReport};
use crate::config::RunConfig;
use crate::data::RunData;
use crate::Result;

/// Run the lower bound command
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
    info!("Starting lower bound estimation...");
    info!("  Exercise dates: {}", config.problem.n_exercise);
    info!("  Mode: {}", config.problem.mode);
    info!("  Training paths: {}", data.train.n_paths());
    info!("  Test paths: {}", data.test.n_paths());

    let engine = LongstaffSchwartzEngine::new(config.lsm_config()?);
    let bound = engine.price(&data.train, &data.test)?;
    let report = BoundReport::new("lower", &bound.estimate, None);

    if let Some(dir) = output_dir {
        save_regressors(dir, &bound)?;
        write_report(dir, &report)?;
    }
    info!(
        price = report.price,
        skipped = bound.skipped_dates(),
        "Lower bound complete"
    );
    Ok(report)
}

/// Save each trained regressor as `regressor_<date>.json`
fn save_regressors(dir: &Path, bound: &LowerBound) -> Result<()> {
    ensure_dir(dir)?;
    for (date, regressor) in bound.regressors.iter().enumerate() {
        let Some(regressor) = regressor else {
            continue;
        };
        let path = dir.join(format!("regressor_{date}.json"));
        regressor.save(&path)?;
    }
    info!(dir = %dir.display(), "Saved regressors");
    Ok(())
}
