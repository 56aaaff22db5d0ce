//! Expansion of configuration template files into test vectors.

use super::Operation;
use crate::errors::PerfRunnerResult;
use std::fs;
use std::path::Path;

/// Reference-driver direction flags swept by the convolution expansion.
pub const DIRECTIONS: [&str; 3] = ["-F 1", "-F 2", "-F 4"];
/// Convolution sub-commands (data types) swept by the expansion.
pub const DATA_TYPES: [&str; 3] = ["conv", "convfp16", "convint8"];
pub const LAYOUTS: [&str; 2] = ["NHWC", "NCHW"];
pub const DATA_TYPES_GEMM: [&str; 3] = ["f32", "f16", "i8"];
pub const TRANSPOSE_FLAGS: [&str; 2] = ["false", "true"];

/// Ordered list of raw test vectors.
pub type ConfigurationSet = Vec<String>;

/// Trimmed template lines that carry a configuration.
fn skeleton_lines<S: AsRef<str>>(lines: &[S]) -> impl Iterator<Item = &str> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Expands every template line across directions, data types and layouts.
///
/// Iteration order is direction, then data type, then layout, then line.
/// int8 is only generated for forward convolutions. No deduplication.
pub fn expand_conv_template<S: AsRef<str>>(lines: &[S]) -> ConfigurationSet {
    let mut configs = Vec::new();
    for direction in DIRECTIONS {
        for data_type in DATA_TYPES {
            if data_type == "convint8" && direction != "-F 1" {
                continue;
            }
            for layout in LAYOUTS {
                for line in skeleton_lines(lines) {
                    configs.push(format!(
                        "{data_type} {direction} -f {layout} -I {layout} -O {layout} {line}"
                    ));
                }
            }
        }
    }
    configs
}

/// Whether a GEMM skeleton already pins `flag` (`-t`, `-transA`, `-transB`),
/// in either `-flag value` or `-flag=value` form.
fn pins_flag(line: &str, flag: &str) -> bool {
    line.split_whitespace().any(|token| {
        let name = token.split('=').next().unwrap_or(token);
        name.trim_start_matches('-') == flag && name.starts_with('-')
    })
}

/// Expands every template line across data types and transpositions, leaving
/// fields the line already pins untouched. Identical results collapse to one.
pub fn expand_gemm_template<S: AsRef<str>>(lines: &[S]) -> ConfigurationSet {
    let mut configs: ConfigurationSet = Vec::new();
    for data_type in DATA_TYPES_GEMM {
        for trans_a in TRANSPOSE_FLAGS {
            for trans_b in TRANSPOSE_FLAGS {
                for line in skeleton_lines(lines) {
                    let mut parts = Vec::with_capacity(4);
                    if !pins_flag(line, "t") {
                        parts.push(format!("-t {data_type}"));
                    }
                    if !pins_flag(line, "transA") {
                        parts.push(format!("-transA {trans_a}"));
                    }
                    if !pins_flag(line, "transB") {
                        parts.push(format!("-transB {trans_b}"));
                    }
                    parts.push(line.to_string());

                    let config = parts.join(" ");
                    if !configs.contains(&config) {
                        configs.push(config);
                    }
                }
            }
        }
    }
    configs
}

pub fn expand_template<S: AsRef<str>>(lines: &[S], operation: Operation) -> ConfigurationSet {
    match operation {
        Operation::Conv => expand_conv_template(lines),
        Operation::Gemm => expand_gemm_template(lines),
    }
}

/// Reads a template file and expands it for `operation`.
pub fn read_configurations(path: &Path, operation: Operation) -> PerfRunnerResult<ConfigurationSet> {
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    Ok(expand_template(&lines, operation))
}
