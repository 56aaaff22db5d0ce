//! External process pipelines and timing extraction.

pub mod metrics;
pub mod mlir;
pub mod process;
pub mod reference;

pub use metrics::{extract_elapsed_nanoseconds, read_profiler_nanoseconds};
pub use mlir::run_mlir_benchmark;
pub use process::{EnvOverlay, Pipeline, PipelineOutcome, Stage};
pub use reference::{run_reference_conv, run_reference_gemm, tune_reference_conv};
