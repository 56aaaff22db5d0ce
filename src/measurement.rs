//! Report rows produced from a descriptor and a measured elapsed time.

use serde::Serialize;
use std::fmt;

/// Name of the throughput column every measurement carries.
pub const THROUGHPUT_COLUMN: &str = "TFlops";

/// A single cell of a report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Float(f64),
}

impl ReportValue {
    /// Renders the cell for a CSV report. Missing measurements are left empty.
    pub fn csv_field(&self) -> String {
        match self {
            ReportValue::Float(v) if v.is_nan() => String::new(),
            other => other.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReportValue::Float(v) => Some(*v),
            ReportValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportValue::Text(s) => f.write_str(s),
            ReportValue::Integer(v) => write!(f, "{}", v),
            ReportValue::Boolean(true) => f.write_str("True"),
            ReportValue::Boolean(false) => f.write_str("False"),
            ReportValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ReportValue {
    fn from(value: &str) -> Self {
        ReportValue::Text(value.to_string())
    }
}

impl From<String> for ReportValue {
    fn from(value: String) -> Self {
        ReportValue::Text(value)
    }
}

impl From<i64> for ReportValue {
    fn from(value: i64) -> Self {
        ReportValue::Integer(value)
    }
}

impl From<bool> for ReportValue {
    fn from(value: bool) -> Self {
        ReportValue::Boolean(value)
    }
}

impl From<f64> for ReportValue {
    fn from(value: f64) -> Self {
        ReportValue::Float(value)
    }
}

/// An ordered mapping from column name to value.
///
/// Column order is part of the contract: rows measured on the generated-kernel
/// path and on the reference path for the same descriptor list their columns
/// in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementResult {
    entries: Vec<(String, ReportValue)>,
}

impl MeasurementResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row by zipping column names with values. Panics if the lengths differ.
    pub fn from_columns(columns: &[&str], values: Vec<ReportValue>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "column list and value list must have the same length"
        );
        Self {
            entries: columns
                .iter()
                .map(|name| name.to_string())
                .zip(values)
                .collect(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<ReportValue>) {
        self.entries.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&ReportValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &ReportValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn entries(&self) -> &[(String, ReportValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The row's throughput in TFlops, NaN when the measurement is missing.
    pub fn throughput(&self) -> f64 {
        self.get(THROUGHPUT_COLUMN)
            .and_then(ReportValue::as_f64)
            .unwrap_or(f64::NAN)
    }

    /// Renames a column in place, keeping its position.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| name == from) {
            entry.0 = to.to_string();
        }
    }

    /// Splits the row into its join key (every column except `excluded`) and the rest.
    pub fn key_without(&self, excluded: &str) -> Vec<(String, ReportValue)> {
        self.entries
            .iter()
            .filter(|(name, _)| name != excluded)
            .cloned()
            .collect()
    }
}
