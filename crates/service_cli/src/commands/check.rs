//! Check command implementation
//!
//! Validates the configuration and, when given, the data file without
//! training anything.

use stopping_core::types::ExerciseGrid;
use tracing::info;

use crate::config::RunConfig;
use crate::data::RunData;
use crate::Result;

/// Run the check command
pub fn run(config: &RunConfig, data: Option<&RunData>) -> Result<()> {
    println!("sigstop v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration:");
    println!("  Log level:       {}", config.log_level);
    println!("  Exercise dates:  {}", config.problem.n_exercise);
    println!("  Horizon:         {}", config.problem.horizon);
    println!("  Rate:            {}", config.problem.rate);
    println!("  Mode:            {}", config.problem.mode);
    println!(
        "  Network:         {} x {} ({})",
        config.network.layers, config.network.nodes, config.network.activation
    );
    println!(
        "  Training:        {} epochs, batch {}, lr {}",
        config.training.epochs, config.training.batch_size, config.training.learning_rate
    );
    println!(
        "  Parallel:        {}",
        if cfg!(feature = "parallel") { "enabled" } else { "disabled" }
    );

    let lsm = config.lsm_config()?;
    println!("  Lower bound:     ok");

    if let Some(data) = data {
        println!();
        println!("Data:");
        println!(
            "  Train:           {} paths, {} steps, {} features",
            data.train.n_paths(),
            data.train.n_steps(),
            data.train.features.n_features()
        );
        println!(
            "  Test:            {} paths, {} steps",
            data.test.n_paths(),
            data.test.n_steps()
        );
        let grid = ExerciseGrid::new(data.train.n_steps(), lsm.n_exercise())?;
        println!("  Exercise grid:   {:?}", grid.exercise_indices());
        match data.increment_steps() {
            Some(steps) => {
                let dual = config.dual_config(data.train.n_paths(), steps)?;
                println!("  Upper bound:     ok ({} fitting paths)", dual.fit_paths());
            }
            None => println!("  Upper bound:     unavailable (no increments)"),
        }
    }

    info!("Check complete");
    Ok(())
}
