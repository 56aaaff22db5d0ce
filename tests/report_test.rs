//! Tests for joining measurements into comparison reports.

use perf_runner::benchmarks::report_table::{
    MLIR_THROUGHPUT_COLUMN, key_columns, reference_throughput_column, speedup_column,
};
use perf_runner::benchmarks::{ReportTable, SpeedupSummary, join, speedup};
use perf_runner::configuration::{BenchmarkDescriptor, GEMM_TABLE_COLUMNS, Operation};
use perf_runner::errors::ReportError;
use perf_runner::measurement::{MeasurementResult, ReportValue};
use std::fs;
use tempfile::TempDir;

const ARCH: &str = "amdgcn-amd-amdhsa:gfx908";

fn gemm_row(m: i64, nanoseconds: f64) -> MeasurementResult {
    let vector = format!("-t f32 -transA false -transB true -g 1 -m {m} -k 64 -n 64");
    BenchmarkDescriptor::parse_test_vector(Operation::Gemm, &vector, ARCH)
        .unwrap()
        .to_report_row(nanoseconds)
}

fn gemm_keys() -> Vec<&'static str> {
    key_columns(&GEMM_TABLE_COLUMNS)
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

#[test]
fn test_speedup() {
    assert_eq!(speedup(20.0, 10.0), 2.0);
    assert!(speedup(f64::NAN, 10.0).is_nan());
    assert!(speedup(10.0, f64::NAN).is_nan());
}

#[test]
fn test_column_names() {
    assert_eq!(MLIR_THROUGHPUT_COLUMN, "MLIR TFlops");
    assert_eq!(
        reference_throughput_column("MIOpen"),
        "MIOpen TFlops (no MLIR Kernels)"
    );
    assert_eq!(speedup_column("rocBLAS"), "MLIR/rocBLAS");
}

#[test]
fn test_key_columns_exclude_throughput() {
    let keys = gemm_keys();
    assert_eq!(keys.len(), GEMM_TABLE_COLUMNS.len() - 1);
    assert!(!keys.contains(&"TFlops"));
}

#[test]
fn test_join_pairs_rows_by_key() {
    let mlir = vec![gemm_row(64, 100.0), gemm_row(128, 100.0)];
    let reference = vec![gemm_row(128, 400.0), gemm_row(64, 200.0)];

    let table = join(&mlir, &reference, &gemm_keys(), "rocBLAS").unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(
        table.columns().last().map(String::as_str),
        Some("MLIR/rocBLAS")
    );
    assert_eq!(table.value(0, "M"), Some(&ReportValue::Integer(64)));
    assert_close(&table.float_column("MLIR/rocBLAS"), &[2.0, 4.0]);

    let mlir_throughput = table.float_column(MLIR_THROUGHPUT_COLUMN);
    let reference_throughput = table.float_column("rocBLAS TFlops (no MLIR Kernels)");
    assert!((mlir_throughput[0] / reference_throughput[0] - 2.0).abs() < 1e-12);
}

#[test]
fn test_join_repeated_keys_pair_one_to_one() {
    let mlir = vec![gemm_row(64, 100.0), gemm_row(64, 300.0)];
    let reference = vec![gemm_row(64, 200.0), gemm_row(64, 600.0)];

    let table = join(&mlir, &reference, &gemm_keys(), "rocBLAS").unwrap();
    assert_close(&table.float_column("MLIR/rocBLAS"), &[2.0, 2.0]);
}

#[test]
fn test_join_propagates_missing_measurements() {
    let mlir = vec![gemm_row(64, f64::NAN)];
    let reference = vec![gemm_row(64, 200.0)];

    let table = join(&mlir, &reference, &gemm_keys(), "rocBLAS").unwrap();
    assert!(table.float_column(MLIR_THROUGHPUT_COLUMN)[0].is_nan());
    assert!(table.float_column("MLIR/rocBLAS")[0].is_nan());
}

#[test]
fn test_join_key_mismatch() {
    let mlir = vec![gemm_row(64, 100.0)];
    let reference = vec![gemm_row(128, 100.0)];

    let result = join(&mlir, &reference, &gemm_keys(), "rocBLAS");
    assert!(matches!(result, Err(ReportError::JoinKeyMismatch { .. })));
}

#[test]
fn test_join_row_count_mismatch() {
    let mlir = vec![gemm_row(64, 100.0), gemm_row(128, 100.0)];
    let reference = vec![gemm_row(64, 100.0)];

    let result = join(&mlir, &reference, &gemm_keys(), "rocBLAS");
    assert!(matches!(
        result,
        Err(ReportError::RowCountMismatch {
            generated: 2,
            reference: 1
        })
    ));
}

#[test]
fn test_table_rejects_foreign_columns() {
    let mut table = ReportTable::new(&["DataType", "TFlops"]);
    let result = table.push_measurement(gemm_row(64, 100.0));
    assert!(matches!(result, Err(ReportError::ColumnMismatch { .. })));
    assert!(table.is_empty());
}

#[test]
fn test_write_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gfx908_mlir_vs_rocblas_perf.csv");
    let mlir = vec![gemm_row(64, f64::NAN)];
    let reference = vec![gemm_row(64, 200.0)];

    join(&mlir, &reference, &gemm_keys(), "rocBLAS")
        .unwrap()
        .write_csv(&path)
        .unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "DataType,Chip,TransA,TransB,G,M,K,N,MLIR TFlops,rocBLAS TFlops (no MLIR Kernels),MLIR/rocBLAS"
    );
    assert!(lines[1].starts_with("f32,gfx908,False,True,1,64,64,64,,"), "{}", lines[1]);
    assert!(lines[1].ends_with(','), "{}", lines[1]);
}

#[test]
fn test_write_measurement_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gfx908_perf.csv");
    let table =
        ReportTable::from_measurements(&GEMM_TABLE_COLUMNS, vec![gemm_row(64, 1000.0)]).unwrap();
    table.write_csv(&path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "DataType,Chip,TransA,TransB,G,M,K,N,TFlops");

    let (key, throughput) = lines[1].rsplit_once(',').unwrap();
    assert_eq!(key, "f32,gfx908,False,True,1,64,64,64");
    assert_close(&[throughput.parse::<f64>().unwrap()], &[0.524288]);
}

#[test]
fn test_speedup_summary() {
    let mlir = vec![gemm_row(64, 100.0), gemm_row(128, 100.0), gemm_row(256, f64::NAN)];
    let reference = vec![gemm_row(64, 200.0), gemm_row(128, 800.0), gemm_row(256, 100.0)];
    let table = join(&mlir, &reference, &gemm_keys(), "rocBLAS").unwrap();

    let summary = SpeedupSummary::from_table(&table, "MLIR/rocBLAS");
    assert_eq!(summary.measured, 2);
    assert_eq!(summary.missing, 1);
    assert!((summary.geometric_mean - 4.0).abs() < 1e-9);
    assert_close(&[summary.min, summary.max], &[2.0, 8.0]);
}

#[test]
fn test_speedup_summary_of_empty_table() {
    let table = ReportTable::new(&["MLIR/MIOpen"]);
    let summary = SpeedupSummary::from_table(&table, "MLIR/MIOpen");
    assert_eq!(summary.measured, 0);
    assert!(summary.geometric_mean.is_nan());
}
