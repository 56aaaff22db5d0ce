//! Benchmark descriptors for the supported operation families.
//!
//! A descriptor is parsed once from a terse test vector, validated, and then
//! rendered into whichever tool grammar a pipeline needs. Descriptors are
//! immutable after construction.

mod conv_configuration;
mod gemm_configuration;
pub mod template;
mod types;

pub use conv_configuration::{
    CONV_TABLE_COLUMNS, ConvConfiguration, ConvShape, XDLOPS_CHIPS, output_size,
};
pub use gemm_configuration::{GEMM_TABLE_COLUMNS, GemmConfiguration};
pub use template::{ConfigurationSet, expand_template, read_configurations};
pub use types::{ConvDirection, DataType, Layout, chip_from_arch};

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::measurement::MeasurementResult;
use serde::Serialize;
use std::fmt;

/// Number of kernel launches per generated-kernel run, amortizing launch overhead.
pub const MLIR_N_REPEATS: i64 = 5;

/// Throughput in TFlops for `flops` operations taking `nanoseconds`.
/// A NaN elapsed time yields NaN.
pub fn compute_tflops(flops: f64, nanoseconds: f64) -> f64 {
    flops / (nanoseconds * 1e-9) / 1e12
}

/// Operation family being benchmarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Conv,
    Gemm,
}

impl Operation {
    pub fn from_name(name: &str) -> ConfigurationResult<Self> {
        match name {
            "conv" => Ok(Operation::Conv),
            "gemm" => Ok(Operation::Gemm),
            _ => Err(ConfigurationError::invalid("operation", name)),
        }
    }

    /// Report columns of this operation, throughput last.
    pub fn table_columns(&self) -> &'static [&'static str] {
        match self {
            Operation::Conv => &CONV_TABLE_COLUMNS,
            Operation::Gemm => &GEMM_TABLE_COLUMNS,
        }
    }

    /// Display name of the vendor reference library.
    pub fn external_name(&self) -> &'static str {
        match self {
            Operation::Conv => "MIOpen",
            Operation::Gemm => "rocBLAS",
        }
    }

    /// File name suffix of the generated-kernel vs. reference report.
    pub fn report_file(&self) -> &'static str {
        match self {
            Operation::Conv => "mlir_vs_miopen_perf.csv",
            Operation::Gemm => "mlir_vs_rocblas_perf.csv",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Conv => f.write_str("conv"),
            Operation::Gemm => f.write_str("gemm"),
        }
    }
}

/// A validated benchmark configuration of either operation family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum BenchmarkDescriptor {
    Conv(ConvConfiguration),
    Gemm(GemmConfiguration),
}

impl BenchmarkDescriptor {
    /// Parses a test vector in the grammar of `operation`.
    pub fn parse<S: AsRef<str>>(
        operation: Operation,
        argv: &[S],
        arch: &str,
    ) -> ConfigurationResult<Self> {
        match operation {
            Operation::Conv => ConvConfiguration::from_command_line(argv, arch).map(Self::Conv),
            Operation::Gemm => GemmConfiguration::from_command_line(argv, arch).map(Self::Gemm),
        }
    }

    /// Parses a whitespace separated test vector.
    pub fn parse_test_vector(
        operation: Operation,
        test_vector: &str,
        arch: &str,
    ) -> ConfigurationResult<Self> {
        let argv: Vec<&str> = test_vector.split_whitespace().collect();
        Self::parse(operation, &argv, arch)
    }

    pub fn operation(&self) -> Operation {
        match self {
            BenchmarkDescriptor::Conv(_) => Operation::Conv,
            BenchmarkDescriptor::Gemm(_) => Operation::Gemm,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            BenchmarkDescriptor::Conv(config) => config.data_type(),
            BenchmarkDescriptor::Gemm(config) => config.data_type(),
        }
    }

    pub fn arch(&self) -> &str {
        match self {
            BenchmarkDescriptor::Conv(config) => config.arch(),
            BenchmarkDescriptor::Gemm(config) => config.arch(),
        }
    }

    pub fn chip(&self) -> &str {
        match self {
            BenchmarkDescriptor::Conv(config) => config.chip(),
            BenchmarkDescriptor::Gemm(config) => config.chip(),
        }
    }

    pub fn table_columns(&self) -> &'static [&'static str] {
        self.operation().table_columns()
    }

    pub fn flop_count(&self) -> f64 {
        match self {
            BenchmarkDescriptor::Conv(config) => config.flop_count(),
            BenchmarkDescriptor::Gemm(config) => config.flop_count(),
        }
    }

    pub fn compute_tflops(&self, nanoseconds: f64) -> f64 {
        compute_tflops(self.flop_count(), nanoseconds)
    }

    /// Generator arguments as separate tokens.
    pub fn tool_arguments(&self, extra_flags: &str) -> Vec<String> {
        match self {
            BenchmarkDescriptor::Conv(config) => config.tool_arguments(extra_flags),
            BenchmarkDescriptor::Gemm(config) => config.tool_arguments(extra_flags),
        }
    }

    /// Generator command line, e.g. `--operation conv2d -t f32 ... --kernel-repeats 5`.
    pub fn to_tool_command_line(&self, extra_flags: &str) -> String {
        self.tool_arguments(extra_flags).join(" ")
    }

    pub fn to_test_vector(&self) -> String {
        match self {
            BenchmarkDescriptor::Conv(config) => config.to_test_vector(),
            BenchmarkDescriptor::Gemm(config) => config.to_test_vector(),
        }
    }

    pub fn to_report_row(&self, nanoseconds: f64) -> MeasurementResult {
        match self {
            BenchmarkDescriptor::Conv(config) => config.to_report_row(nanoseconds),
            BenchmarkDescriptor::Gemm(config) => config.to_report_row(nanoseconds),
        }
    }
}

impl fmt::Display for BenchmarkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.to_test_vector(), self.arch())
    }
}
