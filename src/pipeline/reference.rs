//! Reference-library pipelines: the convolution driver and the profiled GEMM driver.

use super::metrics::{extract_elapsed_nanoseconds, remove_stale_statistics};
use super::mlir::statistics_or_nan;
use super::process::{EnvOverlay, Pipeline, PipelineOutcome, Stage};
use crate::config::RunnerConfig;
use crate::configuration::{ConvConfiguration, GemmConfiguration};
use crate::errors::{PipelineError, PipelineResult};
use log::{info, warn};
use std::path::Path;
use std::time::Duration;

/// Restricts the driver's find step to a search mode.
pub const MIOPEN_FIND_MODE: &str = "MIOPEN_FIND_MODE";
/// Selects the GPU-side reference implementation for verification.
pub const MIOPEN_DRIVER_USE_GPU_REFERENCE: &str = "MIOPEN_DRIVER_USE_GPU_REFERENCE";
/// Forces exhaustive tuning during find.
pub const MIOPEN_FIND_ENFORCE: &str = "MIOPEN_FIND_ENFORCE";
/// Pins the find step to a single named solver.
pub const MIOPEN_DEBUG_FIND_ONLY_SOLVER: &str = "MIOPEN_DEBUG_FIND_ONLY_SOLVER";

/// Driver flag disabling result verification.
const NO_VERIFICATION: [&str; 2] = ["-V", "0"];

/// Overlay making the driver time only the generated-kernel solver.
pub fn mlir_kernel_env(solver: &str) -> EnvOverlay {
    EnvOverlay::from([
        (MIOPEN_FIND_MODE.to_string(), "1".to_string()),
        (MIOPEN_DRIVER_USE_GPU_REFERENCE.to_string(), "1".to_string()),
        (MIOPEN_DEBUG_FIND_ONLY_SOLVER.to_string(), solver.to_string()),
    ])
}

/// Overlay making the driver exhaustively tune the generated-kernel solver.
pub fn tuning_env(solver: &str) -> EnvOverlay {
    EnvOverlay::from([
        (MIOPEN_FIND_ENFORCE.to_string(), "4".to_string()),
        (MIOPEN_DRIVER_USE_GPU_REFERENCE.to_string(), "1".to_string()),
        (MIOPEN_DEBUG_FIND_ONLY_SOLVER.to_string(), solver.to_string()),
    ])
}

fn conv_driver_pipeline<S: AsRef<str>>(
    test_vector: &[S],
    driver: &Path,
    timeout: Duration,
    env: &EnvOverlay,
) -> Pipeline {
    let stage = Stage::new(driver)
        .args(test_vector.iter().map(|token| token.as_ref().to_string()))
        .args(NO_VERIFICATION);
    Pipeline::new(timeout).stage(stage).env(env)
}

/// Runs the convolution reference driver on a raw test vector and returns the
/// elapsed nanoseconds it reports, or NaN.
///
/// The raw tokens are forwarded unchanged so driver-only flags such as `-t 1`
/// (print timings) survive.
pub fn run_reference_conv<S: AsRef<str>>(
    config: &ConvConfiguration,
    test_vector: &[S],
    driver: &Path,
    timeout: Duration,
    env: &EnvOverlay,
) -> PipelineResult<f64> {
    info!("Running MIOpen Benchmark: {}", config.to_test_vector());
    let pipeline = conv_driver_pipeline(test_vector, driver, timeout, env);

    let outcome = pipeline.run()?;
    if outcome.is_timed_out() {
        let error = PipelineError::PipelineTimeout {
            command: pipeline.command_line(),
            timeout,
        };
        warn!("MIOpen benchmark timed out: {}", error);
        return Ok(f64::NAN);
    }
    if !outcome.stderr().trim().is_empty() {
        warn!("MIOpen benchmark produced errors: {}", outcome.stderr().trim_end());
    }

    match extract_elapsed_nanoseconds(outcome.stdout()) {
        Ok(nanoseconds) => Ok(nanoseconds),
        Err(e) => {
            warn!("{}", e);
            warn!("Failing command line: {}", pipeline.command_line());
            Ok(f64::NAN)
        }
    }
}

/// Runs the driver with exhaustive tuning of the generated-kernel solver. No
/// measurement is taken; the tuning database is the side effect.
pub fn tune_reference_conv<S: AsRef<str>>(
    test_vector: &[S],
    driver: &Path,
    timeout: Duration,
    solver: &str,
) -> PipelineResult<()> {
    let pipeline = conv_driver_pipeline(test_vector, driver, timeout, &tuning_env(solver));
    info!("{}", pipeline.command_line());

    let outcome = pipeline.run()?;
    if outcome.is_timed_out() {
        warn!("MIOpen tuning timed out");
    } else if let PipelineOutcome::Completed { status, .. } = &outcome {
        if !status.success() {
            warn!("MIOpen tuning exited with {}: {}", status, outcome.stderr().trim_end());
        }
    }
    Ok(())
}

/// Runs the GEMM reference driver under the profiler and returns the total
/// elapsed nanoseconds from the statistics file, or NaN.
pub fn run_reference_gemm(
    config: &GemmConfiguration,
    driver: &Path,
    runner_config: &RunnerConfig,
) -> PipelineResult<f64> {
    remove_stale_statistics(&runner_config.stats_file)?;
    info!("Running rocBLAS benchmark: {}", config.to_test_vector());

    let stage = Stage::new(&runner_config.rocprof_path)
        .arg("--stats")
        .arg(driver.display().to_string())
        .args(config.tool_arguments(""));
    let pipeline = Pipeline::new(runner_config.reference_gemm_timeout())
        .stage(stage)
        .close_stdin();

    let outcome = pipeline.run()?;
    if outcome.is_timed_out() {
        let error = PipelineError::PipelineTimeout {
            command: pipeline.command_line(),
            timeout: pipeline.timeout(),
        };
        warn!("{}", error);
        return Ok(f64::NAN);
    }
    if !outcome.stderr().trim().is_empty() {
        warn!("Test printed errors: {}", outcome.stderr().trim_end());
        warn!("Failing command line: {}", pipeline.command_line());
    }

    Ok(statistics_or_nan(&runner_config.stats_file))
}
