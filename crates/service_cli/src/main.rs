//! sigstop - Command Line Runner for Signature-Based Optimal Stopping
//!
//! Prices an optimal stopping problem from simulated path signatures.
//!
//! # Commands
//!
//! - `sigstop lower --data <file>` - Lower bound from the regression stopping rule
//! - `sigstop upper --data <file>` - Upper bound from the dual martingale network
//! - `sigstop bounds --data <file>` - Both bounds and the duality gap
//! - `sigstop check` - Validate configuration and data
//!
//! # Architecture
//!
//! As part of the **S**ervice layer, this crate loads configuration
//! (TOML, `SIGSTOP_*` environment variables, CLI flags) and JSON data,
//! runs the `stopping_pricing` engines and saves trained models.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod data;
mod error;

pub use error::{CliError, Result};

use config::{build_config, CliArgs};
use data::RunData;

/// Signature-based optimal stopping bounds
#[derive(Parser)]
#[command(name = "sigstop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML format)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data file path (JSON format)
    #[arg(short, long, global = true, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Directory for trained models and bound reports
    #[arg(short, long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Epoch budget override
    #[arg(long, global = true)]
    epochs: Option<usize>,

    /// Seed override
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the lower bound (Longstaff-Schwartz)
    Lower,

    /// Estimate the upper bound (dual martingale)
    Upper,

    /// Estimate both bounds
    Bounds,

    /// Check configuration and data
    Check,
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn require_data(path: Option<&Path>) -> Result<RunData> {
    let path = path.ok_or_else(|| CliError::InvalidArgument("--data <FILE> is required".to_string()))?;
    RunData::load(path)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let args = CliArgs {
        config_file: cli.config.clone(),
        log_level: cli.log_level.clone(),
        epochs: cli.epochs,
        seed: cli.seed,
    };
    let config = build_config(&args)?;

    init_tracing(config.log_level.as_filter_str());
    info!(
        n_exercise = config.problem.n_exercise,
        mode = %config.problem.mode,
        epochs = config.training.epochs,
        seed = config.training.seed,
        "Configuration loaded"
    );

    let data_path = cli.data.as_deref();
    let output_dir = cli.output_dir.as_deref();
    match cli.command {
        Commands::Lower => {
            commands::lower::run(&config, &require_data(data_path)?, output_dir)?;
        }
        Commands::Upper => {
            commands::upper::run(&config, &require_data(data_path)?, output_dir)?;
        }
        Commands::Bounds => {
            commands::bounds::run(&config, &require_data(data_path)?, output_dir)?;
        }
        Commands::Check => {
            let data = data_path.map(RunData::load).transpose()?;
            commands::check::run(&config, data.as_ref())?;
        }
    }
    Ok(())
}
