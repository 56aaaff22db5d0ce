//! Error types for external process pipelines.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while spawning external tools or reading their results.
///
/// Only `ExternalToolMissing` and `Spawn` are fatal for a run. Timeouts and
/// extraction failures are turned into NaN measurements by the callers.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{tool} was not provided/found where the requested mode requires it")]
    ExternalToolMissing { tool: String },

    #[error("Pipeline timed out after {}s: {command}", .timeout.as_secs())]
    PipelineTimeout { command: String, timeout: Duration },

    #[error("Could not extract {metric} from output: {raw_output:?}")]
    MetricExtractionFailure { metric: String, raw_output: String },

    #[error("Pipeline has no stages")]
    EmptyPipeline,

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read profiler statistics {}: {source}", .path.display())]
    Statistics {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
