//! Bounds command implementation
//!
//! Runs both engines on the same data and reports the duality gap.

use std::path::Path;
use tracing::{info, warn};

use super::{lower, print_table, upper, BoundReport};
use crate::config::RunConfig;
use crate::data::RunData;
use crate::Result;

/// Run the bounds command
pub fn run(
    config: &RunConfig,
    data: &RunData,
    output_dir: Option<&Path>,
) -> Result<(BoundReport, BoundReport)> {
    let lower = lower::estimate(config, data, output_dir)?;
    let upper = upper::estimate(config, data, output_dir)?;

    print_table(&[lower.clone(), upper.clone()]);
    let gap = upper.price - lower.price;
    println!("Duality gap: {gap:.6}");
    if gap < 0.0 {
        warn!(gap, "Upper bound below lower bound");
    }
    info!(lower = lower.price, upper = upper.price, gap, "Bounds complete");
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stopping_models::{DualNetwork, Regressor};

    fn toy_data() -> RunData {
        let paths = 12;
        let steps = 4;
        let features: Vec<Vec<Vec<f64>>> = (0..paths)
            .map(|p| {
                (0..=steps)
                    .map(|t| vec![t as f64 * 0.25, (p % 3) as f64])
                    .collect()
            })
            .collect();
        let payoffs: Vec<Vec<f64>> = (0..paths)
            .map(|p| (0..=steps).map(|t| ((p + t) % 3) as f64).collect())
            .collect();
        let increments = vec![vec![0.0; steps]; paths];
        let json = serde_json::json!({
            "train": { "features": features, "payoffs": payoffs, "increments": increments },
            "test": { "features": features, "payoffs": payoffs, "increments": increments },
        });
        RunData::from_json(&json.to_string()).unwrap()
    }

    fn toy_config() -> RunConfig {
        RunConfig::from_toml(
            r#"
            [problem]
            n_exercise = 2
            rate = 0.05

            [network]
            layers = 1
            nodes = 4

            [training]
            epochs = 2
            batch_size = 4
            dual_fit_paths = 8
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_bounds_save_models_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let (lower, upper) = run(&toy_config(), &toy_data(), Some(dir.path())).unwrap();

        assert!(upper.price >= lower.price);
        assert!(dir.path().join("lower_bound.json").exists());
        assert!(dir.path().join("upper_bound.json").exists());
        assert!(Regressor::load(&dir.path().join("regressor_0.json")).is_ok());
        assert!(DualNetwork::load(&dir.path().join(upper::DUAL_NETWORK_FILE)).is_ok());
    }

    #[test]
    fn test_upper_requires_increments() {
        let mut data = toy_data();
        data.train.increments = None;
        let result = upper::estimate(&toy_config(), &data, None);
        assert!(matches!(result, Err(crate::CliError::InvalidArgument(_))));
    }
}
