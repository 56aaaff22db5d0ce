//! Summary statistics over a comparison report.

use super::report_table::ReportTable;
use log::info;

/// Aggregate view of one speedup column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedupSummary {
    pub column: String,
    pub measured: usize,
    pub missing: usize,
    pub geometric_mean: f64,
    pub min: f64,
    pub max: f64,
}

impl SpeedupSummary {
    /// Summarizes the finite, positive ratios of `column`; the rest count as missing.
    pub fn from_table(table: &ReportTable, column: &str) -> Self {
        let values = table.float_column(column);
        let measured: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();

        let (geometric_mean, min, max) = if measured.is_empty() {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            let log_sum: f64 = measured.iter().map(|v| v.ln()).sum();
            (
                (log_sum / measured.len() as f64).exp(),
                measured.iter().copied().fold(f64::INFINITY, f64::min),
                measured.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        Self {
            column: column.to_string(),
            measured: measured.len(),
            missing: values.len() - measured.len(),
            geometric_mean,
            min,
            max,
        }
    }
}

/// Logs a short analysis of a speedup column.
pub fn print_performance_analysis(summary: &SpeedupSummary) {
    info!("{}", "=".repeat(80));
    info!("Performance Analysis ({})", summary.column);
    info!("{}", "=".repeat(80));
    info!(
        "   Configurations measured: {} ({} missing)",
        summary.measured, summary.missing
    );
    if summary.measured > 0 {
        info!("   Geometric mean speedup: {:.2}x", summary.geometric_mean);
        info!("   Range: {:.2}x .. {:.2}x", summary.min, summary.max);
    }
}
