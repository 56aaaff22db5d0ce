//! Tabular reports and the join of generated-kernel and reference measurements.

use crate::errors::{ReportError, ReportResult};
use crate::measurement::{MeasurementResult, ReportValue, THROUGHPUT_COLUMN};
use std::path::Path;

/// Column holding the generated-kernel throughput after a join.
pub const MLIR_THROUGHPUT_COLUMN: &str = "MLIR TFlops";

/// Column holding the reference throughput after a join.
pub fn reference_throughput_column(external_name: &str) -> String {
    format!("{external_name} TFlops (no MLIR Kernels)")
}

/// Column holding the generated-kernel to reference throughput ratio.
pub fn speedup_column(external_name: &str) -> String {
    format!("MLIR/{external_name}")
}

/// Ratio of generated-kernel to reference throughput. NaN operands give NaN.
pub fn speedup(mlir_throughput: f64, reference_throughput: f64) -> f64 {
    mlir_throughput / reference_throughput
}

/// A rectangular table of report values with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    columns: Vec<String>,
    rows: Vec<Vec<ReportValue>>,
}

impl ReportTable {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from measurement rows that all carry `columns` in order.
    pub fn from_measurements<S: AsRef<str>>(
        columns: &[S],
        measurements: Vec<MeasurementResult>,
    ) -> ReportResult<Self> {
        let mut table = Self::new(columns);
        for measurement in measurements {
            table.push_measurement(measurement)?;
        }
        Ok(table)
    }

    pub fn push_measurement(&mut self, measurement: MeasurementResult) -> ReportResult<()> {
        if !measurement.column_names().eq(self.columns.iter().map(String::as_str)) {
            return Err(ReportError::ColumnMismatch {
                expected: self.columns.clone(),
                actual: measurement.column_names().map(str::to_string).collect(),
            });
        }
        self.rows.push(measurement.values().cloned().collect());
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<ReportValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&ReportValue> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// All values of `column` as floats, NaN where a cell is not numeric.
    pub fn float_column(&self, column: &str) -> Vec<f64> {
        match self.column_index(column) {
            Some(index) => self
                .rows
                .iter()
                .map(|row| row[index].as_f64().unwrap_or(f64::NAN))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Writes the table as comma separated values with a header row.
    pub fn write_csv(&self, path: &Path) -> ReportResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(ReportValue::csv_field))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn join_key(row: &MeasurementResult, key_columns: &[&str]) -> Option<Vec<ReportValue>> {
    key_columns
        .iter()
        .map(|column| row.get(column).cloned())
        .collect()
}

fn describe_key(row: &MeasurementResult, key_columns: &[&str]) -> String {
    key_columns
        .iter()
        .map(|column| match row.get(column) {
            Some(value) => format!("{column}={value}"),
            None => format!("{column}=<missing>"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inner join of generated-kernel rows with reference rows on `key_columns`.
///
/// Each generated-kernel row is matched with the first unused reference row
/// carrying the same key, so repeated configurations pair up one to one. The
/// result keeps the key columns followed by both throughputs and their
/// speedup. A row without a partner is a `JoinKeyMismatch`.
pub fn join(
    mlir_rows: &[MeasurementResult],
    reference_rows: &[MeasurementResult],
    key_columns: &[&str],
    external_name: &str,
) -> ReportResult<ReportTable> {
    if mlir_rows.len() != reference_rows.len() {
        return Err(ReportError::RowCountMismatch {
            generated: mlir_rows.len(),
            reference: reference_rows.len(),
        });
    }

    let reference_keys: Vec<Option<Vec<ReportValue>>> = reference_rows
        .iter()
        .map(|row| join_key(row, key_columns))
        .collect();
    let mut used = vec![false; reference_rows.len()];

    let mut columns: Vec<String> = key_columns.iter().map(|c| c.to_string()).collect();
    columns.push(MLIR_THROUGHPUT_COLUMN.to_string());
    columns.push(reference_throughput_column(external_name));
    columns.push(speedup_column(external_name));
    let mut table = ReportTable::new(&columns);

    for row in mlir_rows {
        let mismatch = || ReportError::JoinKeyMismatch {
            key: describe_key(row, key_columns),
        };
        let key = join_key(row, key_columns).ok_or_else(mismatch)?;
        let partner = reference_keys
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && candidate.as_ref() == Some(&key))
            .ok_or_else(mismatch)?;
        used[partner] = true;

        let mlir_throughput = row.throughput();
        let reference_throughput = reference_rows[partner].throughput();
        let mut values = key;
        values.push(mlir_throughput.into());
        values.push(reference_throughput.into());
        values.push(speedup(mlir_throughput, reference_throughput).into());
        table.rows.push(values);
    }

    Ok(table)
}

/// Key columns of a measurement table: everything except the throughput.
pub fn key_columns(table_columns: &[&'static str]) -> Vec<&'static str> {
    table_columns
        .iter()
        .copied()
        .filter(|column| *column != THROUGHPUT_COLUMN)
        .collect()
}
