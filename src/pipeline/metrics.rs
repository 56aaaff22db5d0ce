//! Extraction of elapsed times from profiler statistics and driver output.

use crate::errors::{PipelineError, PipelineResult};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

/// Profiler statistics column holding the average kernel time in nanoseconds.
pub const AVERAGE_NS_COLUMN: &str = "AverageNs";

/// Sums the `AverageNs` column of a profiler statistics file.
///
/// Returns NaN when the file does not exist: the profiled run produced no
/// kernels, which is a legitimate missing measurement.
pub fn read_profiler_nanoseconds(path: &Path) -> PipelineResult<f64> {
    if !path.exists() {
        return Ok(f64::NAN);
    }

    let statistics_error = |source| PipelineError::Statistics {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(statistics_error)?;
    let column = reader
        .headers()
        .map_err(statistics_error)?
        .iter()
        .position(|header| header == AVERAGE_NS_COLUMN)
        .ok_or_else(|| PipelineError::MetricExtractionFailure {
            metric: AVERAGE_NS_COLUMN.to_string(),
            raw_output: fs::read_to_string(path).unwrap_or_default(),
        })?;

    let mut total = 0.0;
    for record in reader.records() {
        let record = record.map_err(statistics_error)?;
        let field = record.get(column).unwrap_or_default().trim();
        let value: f64 = field
            .parse()
            .map_err(|_| PipelineError::MetricExtractionFailure {
                metric: AVERAGE_NS_COLUMN.to_string(),
                raw_output: field.to_string(),
            })?;
        total += value;
    }
    Ok(total)
}

/// Extracts `Elapsed: <float>ms` from driver output and converts it to nanoseconds.
pub fn extract_elapsed_nanoseconds(output: &str) -> PipelineResult<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| {
        Regex::new(r"Elapsed: (.*?)\s*ms").expect("elapsed time regex must compile")
    });

    regex
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .map(|milliseconds| milliseconds * 1.0e6)
        .ok_or_else(|| PipelineError::MetricExtractionFailure {
            metric: "elapsed time".to_string(),
            raw_output: output.to_string(),
        })
}

/// Removes statistics left behind by a previous profiled run.
pub fn remove_stale_statistics(path: &Path) -> PipelineResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
