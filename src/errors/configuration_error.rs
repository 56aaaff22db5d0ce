//! Error types for descriptor parsing and validation.

use thiserror::Error;

/// Errors raised while turning a test vector into a benchmark descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid {field}: {value}")]
    InvalidField { field: String, value: String },

    #[error("Incomplete {operation} configuration: missing {missing}")]
    IncompleteConfiguration { operation: String, missing: String },

    #[error("Unknown {operation} config argument {flag} -> {value}")]
    UnknownArgument {
        operation: String,
        flag: String,
        value: String,
    },

    #[error("Mixed layouts: {first} and {second}")]
    MixedLayouts { first: String, second: String },
}

impl ConfigurationError {
    pub(crate) fn invalid(field: &str, value: impl Into<String>) -> Self {
        ConfigurationError::InvalidField {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub(crate) fn incomplete(operation: &str, missing: &str) -> Self {
        ConfigurationError::IncompleteConfiguration {
            operation: operation.to_string(),
            missing: missing.to_string(),
        }
    }
}
