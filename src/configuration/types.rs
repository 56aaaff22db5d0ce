//! Enumerated descriptor fields and their fixed lookup tables.

use crate::errors::{ConfigurationError, ConfigurationResult};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Element type of the benchmarked tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    F16,
    F32,
    Bf16,
    I8,
}

impl DataType {
    /// Looks up a data type by its generator name (`f16`, `f32`, `bf16`, `i8`).
    pub fn from_name(name: &str) -> ConfigurationResult<Self> {
        match name {
            "f16" => Ok(DataType::F16),
            "f32" => Ok(DataType::F32),
            "bf16" => Ok(DataType::Bf16),
            "i8" => Ok(DataType::I8),
            _ => Err(ConfigurationError::invalid("datatype", name)),
        }
    }

    /// Looks up a data type by the leading token of a convolution test vector.
    pub fn from_conv_token(token: &str) -> ConfigurationResult<Self> {
        match token {
            "conv" => Ok(DataType::F32),
            "convfp16" => Ok(DataType::F16),
            "convbfp16" => Ok(DataType::Bf16),
            "convint8" => Ok(DataType::I8),
            _ => Err(ConfigurationError::invalid("datatype", token)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::F16 => "f16",
            DataType::F32 => "f32",
            DataType::Bf16 => "bf16",
            DataType::I8 => "i8",
        }
    }

    /// The reference driver's sub-command for convolutions of this type.
    pub fn conv_token(&self) -> &'static str {
        match self {
            DataType::F16 => "convfp16",
            DataType::F32 => "conv",
            DataType::Bf16 => "convbfp16",
            DataType::I8 => "convint8",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convolution direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConvDirection {
    #[serde(rename = "fwd")]
    Forward,
    #[serde(rename = "bwd")]
    BackwardData,
    #[serde(rename = "wrw")]
    BackwardWeight,
}

impl ConvDirection {
    pub fn from_name(name: &str) -> ConfigurationResult<Self> {
        match name {
            "fwd" => Ok(ConvDirection::Forward),
            "bwd" => Ok(ConvDirection::BackwardData),
            "wrw" => Ok(ConvDirection::BackwardWeight),
            _ => Err(ConfigurationError::invalid("direction", name)),
        }
    }

    /// Decodes the reference driver's `-F` value. Combined directions are not supported.
    pub fn from_code(code: &str) -> ConfigurationResult<Self> {
        match code.parse::<i64>() {
            Ok(1) => Ok(ConvDirection::Forward),
            Ok(2) => Ok(ConvDirection::BackwardData),
            Ok(4) => Ok(ConvDirection::BackwardWeight),
            _ => Err(ConfigurationError::invalid("direction", code)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ConvDirection::Forward => 1,
            ConvDirection::BackwardData => 2,
            ConvDirection::BackwardWeight => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConvDirection::Forward => "fwd",
            ConvDirection::BackwardData => "bwd",
            ConvDirection::BackwardWeight => "wrw",
        }
    }

    /// Operation name understood by the kernel generator.
    pub fn generator_operation(&self) -> &'static str {
        match self {
            ConvDirection::Forward => "conv2d",
            ConvDirection::BackwardData => "conv2d_bwd_data",
            ConvDirection::BackwardWeight => "conv2d_bwd_weight",
        }
    }
}

impl fmt::Display for ConvDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tensor layout of a convolution. The input layout selects the filter and
/// output layouts as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layout {
    Nchw,
    Nhwc,
}

impl Layout {
    pub fn from_name(name: &str) -> ConfigurationResult<Self> {
        match name {
            "NCHW" => Ok(Layout::Nchw),
            "NHWC" => Ok(Layout::Nhwc),
            _ => Err(ConfigurationError::invalid("layout", name)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Nchw => "NCHW",
            Layout::Nhwc => "NHWC",
        }
    }

    pub fn input_layout(&self) -> &'static str {
        match self {
            Layout::Nchw => "nchw",
            Layout::Nhwc => "nhwc",
        }
    }

    pub fn filter_layout(&self) -> &'static str {
        match self {
            Layout::Nchw => "kcyx",
            Layout::Nhwc => "kyxc",
        }
    }

    pub fn output_layout(&self) -> &'static str {
        match self {
            Layout::Nchw => "nkhw",
            Layout::Nhwc => "nhwk",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracts the chip name (`gfx908`, `gfx90a`, ...) from an architecture string
/// such as `amdgcn-amd-amdhsa:gfx90a:sramecc+:xnack-`.
pub fn chip_from_arch(arch: &str) -> ConfigurationResult<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| Regex::new(r"gfx[0-9a-z]+").expect("chip regex must compile"));

    regex
        .find(arch)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ConfigurationError::invalid("arch", arch))
}

pub(crate) fn parse_int(field: &str, value: &str) -> ConfigurationResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| ConfigurationError::invalid(field, value))
}
