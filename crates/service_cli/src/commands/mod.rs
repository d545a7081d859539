//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

pub mod bounds;
pub mod check;
pub mod lower;
pub mod upper;

use serde::Serialize;
use std::path::Path;
use stopping_core::math::SampleSummary;
use tracing::info;

use crate::{CliError, Result};

/// Bound estimate as printed and written to `<kind>_bound.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundReport {
    pub bound: &'static str,
    pub price: f64,
    pub std_dev: f64,
    pub std_error: f64,
    pub confidence_95: f64,
    pub paths: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y0: Option<f64>,
}

impl BoundReport {
    pub fn new(bound: &'static str, estimate: &SampleSummary, y0: Option<f64>) -> Self {
        Self {
            bound,
            price: estimate.mean,
            std_dev: estimate.std_dev,
            std_error: estimate.std_error(),
            confidence_95: estimate.confidence_95(),
            paths: estimate.n,
            y0,
        }
    }

    /// Print as a table row
    pub fn print_row(&self) {
        println!(
            "│ {:<6} │ {:>12.6} │ {:>12.6} │ {:>12.6} │ {:>8} │",
            self.bound, self.price, self.std_dev, self.std_error, self.paths
        );
    }
}

pub(crate) fn print_table(reports: &[BoundReport]) {
    println!("\n┌────────┬──────────────┬──────────────┬──────────────┬──────────┐");
    println!("│ Bound  │ Price        │ Std dev      │ Std error    │ Paths    │");
    println!("├────────┼──────────────┼──────────────┼──────────────┼──────────┤");
    for report in reports {
        report.print_row();
    }
    println!("└────────┴──────────────┴──────────────┴──────────────┴──────────┘");
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| CliError::io(dir, e))
}

pub(crate) fn write_report(dir: &Path, report: &BoundReport) -> Result<()> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{}_bound.json", report.bound));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).map_err(|e| CliError::io(&path, e))?;
    info!(path = %path.display(), "Wrote bound report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = SampleSummary::from_values(&[1.0, 3.0]);
        let report = BoundReport::new("upper", &summary, Some(2.5));
        write_report(dir.path(), &report).unwrap();

        let text = std::fs::read_to_string(dir.path().join("upper_bound.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["price"], 2.0);
        assert_eq!(value["y0"], 2.5);
        assert_eq!(value["paths"], 2);
    }

    #[test]
    fn test_lower_report_omits_y0() {
        let report = BoundReport::new("lower", &SampleSummary::from_values(&[1.0]), None);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("y0"));
    }
}
