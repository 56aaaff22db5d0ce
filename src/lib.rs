//! Performance runner comparing generated convolution and GEMM kernels with
//! vendor reference libraries.
//!
//! Test vectors are parsed into validated descriptors, driven through external
//! tool pipelines (kernel generator, lowering driver and profiler, or the
//! reference driver), and the measured times are turned into throughput rows
//! that can be joined into a comparison report.

pub mod benchmarks;
pub mod config;
pub mod configuration;
pub mod errors;
pub mod measurement;
pub mod pipeline;

pub use benchmarks::{BenchmarkRunner, ReportTable};
pub use config::{ConfigLoader, MlirPaths, RunnerConfig, ToolPaths};
pub use configuration::{BenchmarkDescriptor, ConvConfiguration, GemmConfiguration, Operation};
pub use measurement::{MeasurementResult, ReportValue};
