//! Benchmark orchestration and result aggregation.
//!
//! Configurations run strictly one after another: the accelerator is shared by
//! every invocation, so concurrent runs would corrupt timings.

pub mod benchmark_runner;
pub mod performance_metrics;
pub mod report_table;

pub use benchmark_runner::{
    BenchmarkRunner, MIOPEN_TUNED_REPORT_FILE, MIOPEN_UNTUNED_REPORT_FILE, ParsedConfiguration,
    report_file_name,
};
pub use performance_metrics::{SpeedupSummary, print_performance_analysis};
pub use report_table::{ReportTable, join, speedup};
