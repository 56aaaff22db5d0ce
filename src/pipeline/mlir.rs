//! Generated-kernel pipeline: generator | lowering driver | profiled CPU runner.

use super::metrics::{read_profiler_nanoseconds, remove_stale_statistics};
use super::process::{Pipeline, PipelineOutcome, Stage};
use crate::config::{MlirPaths, RunnerConfig};
use crate::configuration::BenchmarkDescriptor;
use crate::errors::{PipelineError, PipelineResult};
use log::{info, warn};

/// Builds the three-stage pipeline for `descriptor`.
pub fn mlir_pipeline(
    descriptor: &BenchmarkDescriptor,
    paths: &MlirPaths,
    config: &RunnerConfig,
    rocmlir_gen_flags: &str,
) -> Pipeline {
    let generator = Stage::new(&paths.rocmlir_gen_path)
        .arg("-ph")
        .args(descriptor.tool_arguments(rocmlir_gen_flags));
    let lowering = Stage::new(&paths.rocmlir_driver_path).arg("-c");
    let runner = Stage::new(&config.rocprof_path)
        .arg("--stats")
        .arg(paths.cpu_runner_path.display().to_string())
        .arg(paths.shared_libs_argument())
        .arg("--entry-point-result=void");

    Pipeline::new(config.mlir_timeout())
        .stage(generator)
        .stage(lowering)
        .stage(runner)
}

/// Runs the generated kernel for `descriptor` under the profiler and returns the
/// total elapsed nanoseconds across all kernel repeats, or NaN if no
/// measurement could be taken.
pub fn run_mlir_benchmark(
    descriptor: &BenchmarkDescriptor,
    paths: &MlirPaths,
    config: &RunnerConfig,
    rocmlir_gen_flags: &str,
) -> PipelineResult<f64> {
    remove_stale_statistics(&config.stats_file)?;
    info!("Running MLIR Benchmark: {}", descriptor);

    let pipeline = mlir_pipeline(descriptor, paths, config, rocmlir_gen_flags);
    match pipeline.run()? {
        PipelineOutcome::TimedOut { .. } => {
            let error = PipelineError::PipelineTimeout {
                command: pipeline.command_line(),
                timeout: pipeline.timeout(),
            };
            warn!("{}", error);
            return Ok(f64::NAN);
        }
        PipelineOutcome::Completed { stderr, .. } if !stderr.trim().is_empty() => {
            warn!("Test printed errors: {}", stderr.trim_end());
            warn!("Failing command line: {}", pipeline.command_line());
        }
        PipelineOutcome::Completed { .. } => {}
    }

    Ok(statistics_or_nan(&config.stats_file))
}

/// Reads the profiler statistics, logging and absorbing malformed files.
pub(crate) fn statistics_or_nan(path: &std::path::Path) -> f64 {
    match read_profiler_nanoseconds(path) {
        Ok(nanoseconds) => nanoseconds,
        Err(e) => {
            warn!("{}", e);
            f64::NAN
        }
    }
}
