//! Error types for the performance runner.
//!
//! Each component owns a dedicated error enum; `PerfRunnerError` wraps them for
//! the binary and for the top-level run functions.

mod configuration_error;
mod pipeline_error;
mod report_error;

pub use configuration_error::ConfigurationError;
pub use pipeline_error::PipelineError;
pub use report_error::ReportError;

use thiserror::Error;

/// Errors surfaced by a whole benchmarking run.
#[derive(Error, Debug)]
pub enum PerfRunnerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Failed to parse runner configuration '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for descriptor parsing and validation.
pub type ConfigurationResult<T> = std::result::Result<T, ConfigurationError>;

/// Result type alias for pipeline execution.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Result type alias for aggregation and report writing.
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Result type alias for a whole run.
pub type PerfRunnerResult<T> = std::result::Result<T, PerfRunnerError>;
