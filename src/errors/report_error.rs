//! Error types for result aggregation and report output.

use thiserror::Error;

/// Errors raised while joining measurements or writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Join key mismatch: no reference row matches {key}")]
    JoinKeyMismatch { key: String },

    #[error("Row count mismatch: {generated} generated-kernel rows, {reference} reference rows")]
    RowCountMismatch { generated: usize, reference: usize },

    #[error("Row columns {actual:?} do not match table columns {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
