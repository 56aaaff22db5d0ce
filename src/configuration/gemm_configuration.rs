//! GEMM benchmark descriptor.

use super::types::{DataType, chip_from_arch, parse_int};
use super::{MLIR_N_REPEATS, compute_tflops};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::measurement::{MeasurementResult, ReportValue, THROUGHPUT_COLUMN};
use serde::Serialize;

/// Report columns of a GEMM measurement, in report order.
pub const GEMM_TABLE_COLUMNS: [&str; 9] = [
    "DataType",
    "Chip",
    "TransA",
    "TransB",
    "G",
    "M",
    "K",
    "N",
    THROUGHPUT_COLUMN,
];

/// A validated (batched) matrix multiplication benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GemmConfiguration {
    data_type: DataType,
    g: i64,
    m: i64,
    k: i64,
    n: i64,
    trans_a: bool,
    trans_b: bool,
    arch: String,
    chip: String,
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true")
}

impl GemmConfiguration {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data_type: DataType,
        g: i64,
        m: i64,
        k: i64,
        n: i64,
        trans_a: bool,
        trans_b: bool,
        arch: &str,
    ) -> ConfigurationResult<Self> {
        for (field, value) in [("g", g), ("m", m), ("k", k), ("n", n)] {
            if value < 1 {
                return Err(ConfigurationError::invalid(field, value.to_string()));
            }
        }
        Ok(Self {
            data_type,
            g,
            m,
            k,
            n,
            trans_a,
            trans_b,
            arch: arch.to_string(),
            chip: chip_from_arch(arch)?,
        })
    }

    /// Parses `-flag value` pairs such as `-t f32 -transA true -transB false -g 1 -m 1024 -k 769 -n 512`.
    ///
    /// `-flag=value` tokens are accepted as well. Any flag outside the grammar is
    /// rejected with `UnknownArgument`.
    pub fn from_command_line<S: AsRef<str>>(argv: &[S], arch: &str) -> ConfigurationResult<Self> {
        let mut data_type = None;
        let mut g = None;
        let mut m = None;
        let mut k = None;
        let mut n = None;
        let mut trans_a = None;
        let mut trans_b = None;

        let mut tokens = argv.iter().map(AsRef::as_ref);
        while let Some(token) = tokens.next() {
            let (flag, value) = match token.split_once('=') {
                Some((flag, value)) => (flag, value),
                None => (
                    token,
                    tokens.next().ok_or_else(|| {
                        ConfigurationError::incomplete("GEMM", &format!("value for {token}"))
                    })?,
                ),
            };

            match flag {
                "-t" => data_type = Some(DataType::from_name(value)?),
                "-g" => g = Some(parse_int("g", value)?),
                "-m" => m = Some(parse_int("m", value)?),
                "-k" => k = Some(parse_int("k", value)?),
                "-n" => n = Some(parse_int("n", value)?),
                f if f.ends_with("-transA") => trans_a = Some(parse_bool(value)),
                f if f.ends_with("-transB") => trans_b = Some(parse_bool(value)),
                _ => {
                    return Err(ConfigurationError::UnknownArgument {
                        operation: "GEMM".to_string(),
                        flag: flag.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }

        let missing = |name: &str| ConfigurationError::incomplete("GEMM", name);
        Self::new(
            data_type.ok_or_else(|| missing("-t"))?,
            g.ok_or_else(|| missing("-g"))?,
            m.ok_or_else(|| missing("-m"))?,
            k.ok_or_else(|| missing("-k"))?,
            n.ok_or_else(|| missing("-n"))?,
            trans_a.ok_or_else(|| missing("-transA"))?,
            trans_b.ok_or_else(|| missing("-transB"))?,
            arch,
        )
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns `(g, m, k, n)`.
    pub fn dims(&self) -> (i64, i64, i64, i64) {
        (self.g, self.m, self.k, self.n)
    }

    pub fn trans_a(&self) -> bool {
        self.trans_a
    }

    pub fn trans_b(&self) -> bool {
        self.trans_b
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    /// Floating point operations of one GEMM: `2*g*m*k*n`.
    pub fn flop_count(&self) -> f64 {
        2.0 * self.g as f64 * self.m as f64 * self.k as f64 * self.n as f64
    }

    /// Generator arguments. The GEMM reference driver accepts the same grammar.
    pub fn tool_arguments(&self, extra_flags: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-operation".into(),
            "gemm".into(),
            "-t".into(),
            self.data_type.as_str().into(),
            "--arch".into(),
            self.arch.clone(),
        ];
        for (flag, value) in [("-g", self.g), ("-m", self.m), ("-k", self.k), ("-n", self.n)] {
            args.push(flag.to_string());
            args.push(value.to_string());
        }
        args.push(format!("-transA={}", self.trans_a));
        args.push(format!("-transB={}", self.trans_b));
        args.push("--kernel-repeats".into());
        args.push(MLIR_N_REPEATS.to_string());
        args.extend(extra_flags.split_whitespace().map(str::to_string));
        args
    }

    pub fn to_test_vector(&self) -> String {
        format!(
            "-t {} -transA {} -transB {} -g {} -m {} -k {} -n {}",
            self.data_type, self.trans_a, self.trans_b, self.g, self.m, self.k, self.n
        )
    }

    /// Builds the report row for a measured total of `nanoseconds`.
    pub fn to_report_row(&self, nanoseconds: f64) -> MeasurementResult {
        let values = vec![
            ReportValue::from(self.data_type.as_str()),
            ReportValue::from(self.chip.as_str()),
            self.trans_a.into(),
            self.trans_b.into(),
            self.g.into(),
            self.m.into(),
            self.k.into(),
            self.n.into(),
            compute_tflops(self.flop_count(), nanoseconds).into(),
        ];
        MeasurementResult::from_columns(&GEMM_TABLE_COLUMNS, values)
    }
}
