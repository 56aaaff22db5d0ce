//! Performance runner CLI executable.

use clap::{ArgGroup, Parser, ValueEnum};
use log::{error, info};
use perf_runner::benchmarks::{
    MIOPEN_TUNED_REPORT_FILE, MIOPEN_UNTUNED_REPORT_FILE, ReportTable, report_file_name,
};
use perf_runner::configuration::{BenchmarkDescriptor, Operation, read_configurations};
use perf_runner::errors::{PerfRunnerResult, PipelineError};
use perf_runner::{BenchmarkRunner, ConfigLoader, RunnerConfig, ToolPaths};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OperationArg {
    Conv,
    Gemm,
}

impl From<OperationArg> for Operation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Conv => Operation::Conv,
            OperationArg::Gemm => Operation::Gemm,
        }
    }
}

/// Benchmarks generated kernels against the MIOpen / rocBLAS reference.
#[derive(Parser, Debug)]
#[command(name = "perf-runner", version)]
#[command(group(ArgGroup::new("mode").args([
    "batch_both",
    "batch_mlir",
    "batch_external",
    "external",
    "miopen_use_tuned_mlir",
    "miopen_use_untuned_mlir",
    "tuning",
])))]
struct Cli {
    /// Operation to benchmark
    #[arg(long = "operation", visible_alias = "op", value_enum, default_value = "conv")]
    operation: OperationArg,

    /// Batch benchmark with MLIR and the external reference (default)
    #[arg(long)]
    batch_both: bool,

    /// Batch benchmark with MLIR only
    #[arg(short = 'b', long)]
    batch_mlir: bool,

    /// Batch benchmark with the external reference only
    #[arg(long)]
    batch_external: bool,

    /// Benchmark a single config with the external reference
    #[arg(long)]
    external: bool,

    /// Run MIOpen restricted to tuned MLIR kernels
    #[arg(long)]
    miopen_use_tuned_mlir: bool,

    /// Run MIOpen restricted to untuned MLIR kernels
    #[arg(long)]
    miopen_use_untuned_mlir: bool,

    /// Only tune the MLIR kernels inside MIOpen
    #[arg(long)]
    tuning: bool,

    /// Template file of configurations to test
    #[arg(short = 'c', long)]
    configs_file: Option<PathBuf>,

    /// Output file name for single-dataset tables
    #[arg(short = 'o')]
    file_name: Option<PathBuf>,

    /// Directory receiving generated reports
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Target architecture, e.g. amdgcn-amd-amdhsa:gfx90a
    #[arg(long)]
    arch: String,

    /// Build directory of the MLIR based kernel generator
    #[arg(long)]
    mlir_build_dir: Option<PathBuf>,

    /// Build directory of MIOpen
    #[arg(long)]
    miopen_build_dir: Option<PathBuf>,

    /// JSON runner configuration
    #[arg(long = "config", default_value = "perf_runner.json")]
    runner_config: PathBuf,

    /// rocmlir-gen flags to toggle each feature
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    rocmlir_gen_flags: String,

    /// Print the expanded descriptors as JSON lines and exit
    #[arg(long)]
    dry_run: bool,

    /// A single test vector to benchmark instead of the configs file
    #[arg(last = true)]
    test_vector: Vec<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        error!("Benchmark execution failed: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> PerfRunnerResult<()> {
    let operation = Operation::from(cli.operation);
    let config = load_config(&cli)?;
    let tools = ToolPaths::from_build_dirs(
        config.mlir_build_dir.as_deref(),
        config.miopen_build_dir.as_deref(),
    );

    let configs: Vec<String> = if !cli.test_vector.is_empty() {
        vec![cli.test_vector.join(" ")]
    } else if let Some(path) = &cli.configs_file {
        read_configurations(path, operation)?
    } else {
        Vec::new()
    };

    if cli.dry_run {
        for config in &configs {
            let descriptor = BenchmarkDescriptor::parse_test_vector(operation, config, &cli.arch)?;
            match serde_json::to_string(&descriptor) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Could not serialize {}: {}", descriptor, e),
            }
        }
        return Ok(());
    }

    check_tools(&cli, operation, &tools, &config)?;
    let runner = BenchmarkRunner::new(&cli.arch, tools, config)
        .with_rocmlir_gen_flags(&cli.rocmlir_gen_flags);
    let chip = runner.chip()?;
    info!(
        "Benchmarking {} {} configurations on {}",
        configs.len(),
        operation,
        chip
    );

    if cli.miopen_use_tuned_mlir || cli.miopen_use_untuned_mlir {
        let suffix = if cli.miopen_use_tuned_mlir {
            MIOPEN_TUNED_REPORT_FILE
        } else {
            MIOPEN_UNTUNED_REPORT_FILE
        };
        let table = runner.benchmark_miopen_with_mlir_kernels(&configs)?;
        return write_report(&table, cli.output_dir.join(report_file_name(&chip, suffix)));
    }
    if cli.tuning {
        return runner.tune_mlir_kernels(&configs);
    }
    if is_batch_both(&cli) {
        let table = runner.generate_performance_results(operation, &configs)?;
        let file = report_file_name(&chip, operation.report_file());
        return write_report(&table, cli.output_dir.join(file));
    }

    let table = if cli.batch_external || cli.external {
        runner.batch_external(operation, &configs)?
    } else {
        runner.batch_mlir(operation, &configs)?
    };
    let file = cli
        .file_name
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{chip}_perf.csv")));
    write_report(&table, cli.output_dir.join(file))
}

fn load_config(cli: &Cli) -> PerfRunnerResult<RunnerConfig> {
    let mut config = ConfigLoader::load(&cli.runner_config)?;
    if cli.mlir_build_dir.is_some() {
        config.mlir_build_dir = cli.mlir_build_dir.clone();
    }
    if cli.miopen_build_dir.is_some() {
        config.miopen_build_dir = cli.miopen_build_dir.clone();
    }
    Ok(config)
}

/// A run without an explicit mode and without a single test vector compares both paths.
fn is_batch_both(cli: &Cli) -> bool {
    cli.batch_both
        || (!cli.batch_mlir
            && !cli.batch_external
            && !cli.external
            && cli.test_vector.is_empty())
}

/// Fails before any benchmarking when a tool the selected mode needs is absent.
fn check_tools(
    cli: &Cli,
    operation: Operation,
    tools: &ToolPaths,
    config: &RunnerConfig,
) -> Result<(), PipelineError> {
    let needs_external = cli.external || cli.batch_external || is_batch_both(cli);
    let needs_miopen = cli.miopen_use_tuned_mlir || cli.miopen_use_untuned_mlir || cli.tuning;
    let needs_mlir = cli.batch_mlir
        || is_batch_both(cli)
        || (!cli.test_vector.is_empty() && !cli.external && !needs_miopen);

    if needs_miopen {
        tools.miopen_driver()?;
        return Ok(());
    }
    if needs_external {
        tools.require_external(operation)?;
    }
    if needs_mlir {
        tools.mlir()?;
    }
    if needs_mlir || (needs_external && operation == Operation::Gemm) {
        config.profiler()?;
    }
    Ok(())
}

fn write_report(table: &ReportTable, path: PathBuf) -> PerfRunnerResult<()> {
    table.write_csv(&path)?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}
