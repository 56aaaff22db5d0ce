//! Batch execution of test vectors through the generated-kernel and reference paths.

use super::performance_metrics::{SpeedupSummary, print_performance_analysis};
use super::report_table::{ReportTable, join, key_columns, speedup_column};
use crate::config::{RunnerConfig, ToolPaths};
use crate::configuration::{
    BenchmarkDescriptor, ConvConfiguration, Layout, Operation, chip_from_arch,
};
use crate::errors::{ConfigurationError, PerfRunnerResult};
use crate::measurement::MeasurementResult;
use crate::pipeline::reference::mlir_kernel_env;
use crate::pipeline::{
    EnvOverlay, run_mlir_benchmark, run_reference_conv, run_reference_gemm, tune_reference_conv,
};
use log::info;

/// Report suffix of the reference driver restricted to tuned generated kernels.
pub const MIOPEN_TUNED_REPORT_FILE: &str = "miopen_tuned_perf.csv";
/// Report suffix of the reference driver restricted to untuned generated kernels.
pub const MIOPEN_UNTUNED_REPORT_FILE: &str = "miopen_untuned_perf.csv";

/// Output file name for a report: `<chip>_<suffix>`.
pub fn report_file_name(chip: &str, suffix: &str) -> String {
    format!("{chip}_{suffix}")
}

/// A test vector together with the descriptor parsed from it.
#[derive(Debug, Clone)]
pub struct ParsedConfiguration {
    pub test_vector: Vec<String>,
    pub descriptor: BenchmarkDescriptor,
}

/// Runs benchmarks one configuration at a time on the target architecture.
pub struct BenchmarkRunner {
    arch: String,
    tools: ToolPaths,
    config: RunnerConfig,
    rocmlir_gen_flags: String,
}

impl BenchmarkRunner {
    pub fn new(arch: &str, tools: ToolPaths, config: RunnerConfig) -> Self {
        Self {
            arch: arch.to_string(),
            tools,
            config,
            rocmlir_gen_flags: String::new(),
        }
    }

    /// Extra generator flags appended to every generated-kernel command line.
    pub fn with_rocmlir_gen_flags(mut self, flags: &str) -> Self {
        self.rocmlir_gen_flags = flags.to_string();
        self
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn chip(&self) -> PerfRunnerResult<String> {
        Ok(chip_from_arch(&self.arch)?)
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Parses one whitespace separated test vector.
    pub fn parse(
        &self,
        operation: Operation,
        test_vector: &str,
    ) -> PerfRunnerResult<ParsedConfiguration> {
        let tokens: Vec<String> = test_vector
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let descriptor = BenchmarkDescriptor::parse(operation, &tokens, &self.arch)?;
        Ok(ParsedConfiguration {
            test_vector: tokens,
            descriptor,
        })
    }

    /// Parses a whole configuration set before anything runs, so a malformed
    /// template aborts the batch up front.
    pub fn parse_all<S: AsRef<str>>(
        &self,
        operation: Operation,
        configs: &[S],
    ) -> PerfRunnerResult<Vec<ParsedConfiguration>> {
        configs
            .iter()
            .map(|config| self.parse(operation, config.as_ref()))
            .collect()
    }

    /// Measures one configuration through the generated-kernel pipeline.
    pub fn benchmark_mlir(
        &self,
        parsed: &ParsedConfiguration,
    ) -> PerfRunnerResult<MeasurementResult> {
        let paths = self.tools.mlir()?;
        self.config.profiler()?;
        let nanoseconds = run_mlir_benchmark(
            &parsed.descriptor,
            paths,
            &self.config,
            &self.rocmlir_gen_flags,
        )?;
        Ok(parsed.descriptor.to_report_row(nanoseconds))
    }

    /// Measures one configuration through the reference library.
    pub fn benchmark_external(
        &self,
        parsed: &ParsedConfiguration,
        env: &EnvOverlay,
    ) -> PerfRunnerResult<MeasurementResult> {
        let nanoseconds = match &parsed.descriptor {
            BenchmarkDescriptor::Conv(conv) => run_reference_conv(
                conv,
                &parsed.test_vector,
                self.tools.miopen_driver()?,
                self.config.reference_conv_timeout(),
                env,
            )?,
            BenchmarkDescriptor::Gemm(gemm) => {
                let driver = self.tools.rocblas_driver()?;
                self.config.profiler()?;
                run_reference_gemm(gemm, driver, &self.config)?
            }
        };
        Ok(parsed.descriptor.to_report_row(nanoseconds))
    }

    /// Runs every configuration through the generated-kernel path, then every
    /// configuration through the reference path.
    pub fn run_batch<S: AsRef<str>>(
        &self,
        operation: Operation,
        configs: &[S],
    ) -> PerfRunnerResult<(Vec<MeasurementResult>, Vec<MeasurementResult>)> {
        let parsed = self.parse_all(operation, configs)?;
        let mlir_rows = parsed
            .iter()
            .map(|config| self.benchmark_mlir(config))
            .collect::<PerfRunnerResult<Vec<_>>>()?;
        let reference_rows = parsed
            .iter()
            .map(|config| self.benchmark_external(config, &EnvOverlay::new()))
            .collect::<PerfRunnerResult<Vec<_>>>()?;
        Ok((mlir_rows, reference_rows))
    }

    /// Generated-kernel measurements only.
    pub fn batch_mlir<S: AsRef<str>>(
        &self,
        operation: Operation,
        configs: &[S],
    ) -> PerfRunnerResult<ReportTable> {
        let rows = self
            .parse_all(operation, configs)?
            .iter()
            .map(|config| self.benchmark_mlir(config))
            .collect::<PerfRunnerResult<Vec<_>>>()?;
        Ok(ReportTable::from_measurements(operation.table_columns(), rows)?)
    }

    /// Reference measurements only.
    pub fn batch_external<S: AsRef<str>>(
        &self,
        operation: Operation,
        configs: &[S],
    ) -> PerfRunnerResult<ReportTable> {
        let rows = self
            .parse_all(operation, configs)?
            .iter()
            .map(|config| self.benchmark_external(config, &EnvOverlay::new()))
            .collect::<PerfRunnerResult<Vec<_>>>()?;
        Ok(ReportTable::from_measurements(operation.table_columns(), rows)?)
    }

    /// Generated-kernel vs. reference comparison table with a speedup column.
    pub fn generate_performance_results<S: AsRef<str>>(
        &self,
        operation: Operation,
        configs: &[S],
    ) -> PerfRunnerResult<ReportTable> {
        let (mlir_rows, reference_rows) = self.run_batch(operation, configs)?;
        let external_name = operation.external_name();
        let table = join(
            &mlir_rows,
            &reference_rows,
            &key_columns(operation.table_columns()),
            external_name,
        )?;

        let summary = SpeedupSummary::from_table(&table, &speedup_column(external_name));
        print_performance_analysis(&summary);
        Ok(table)
    }

    /// Reference-driver measurements restricted to the generated-kernel solver
    /// of each convolution. Whether the kernels are tuned depends on the
    /// driver's tuning database, not on this run.
    pub fn benchmark_miopen_with_mlir_kernels<S: AsRef<str>>(
        &self,
        configs: &[S],
    ) -> PerfRunnerResult<ReportTable> {
        let mut rows = Vec::new();
        for parsed in self.parse_all(Operation::Conv, configs)? {
            let solver = conv_descriptor(&parsed)?.solver_name();
            rows.push(self.benchmark_external(&parsed, &mlir_kernel_env(&solver))?);
        }
        Ok(ReportTable::from_measurements(
            Operation::Conv.table_columns(),
            rows,
        )?)
    }

    /// Exhaustively tunes the generated-kernel solver of every NCHW convolution.
    pub fn tune_mlir_kernels<S: AsRef<str>>(&self, configs: &[S]) -> PerfRunnerResult<()> {
        let driver = self.tools.miopen_driver()?;
        for parsed in self.parse_all(Operation::Conv, configs)? {
            let conv = conv_descriptor(&parsed)?;
            if conv.layout() != Layout::Nchw {
                info!(
                    "Skipping tuning of non-NCHW configuration {}",
                    conv.to_test_vector()
                );
                continue;
            }
            tune_reference_conv(
                &parsed.test_vector,
                driver,
                self.config.reference_conv_timeout(),
                &conv.solver_name(),
            )?;
        }
        Ok(())
    }
}

fn conv_descriptor(parsed: &ParsedConfiguration) -> PerfRunnerResult<&ConvConfiguration> {
    match &parsed.descriptor {
        BenchmarkDescriptor::Conv(conv) => Ok(conv),
        BenchmarkDescriptor::Gemm(_) => {
            Err(ConfigurationError::invalid("operation", "gemm").into())
        }
    }
}
