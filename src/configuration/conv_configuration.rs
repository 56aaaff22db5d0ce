//! Convolution benchmark descriptor.

use super::{MLIR_N_REPEATS, compute_tflops};
use super::types::{ConvDirection, DataType, Layout, chip_from_arch, parse_int};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::measurement::{MeasurementResult, ReportValue, THROUGHPUT_COLUMN};
use log::debug;
use serde::Serialize;

/// Report columns of a convolution measurement, in report order.
pub const CONV_TABLE_COLUMNS: [&str; 20] = [
    "Direction",
    "DataType",
    "Chip",
    "FilterLayout",
    "InputLayout",
    "OutputLayout",
    "N",
    "C",
    "H",
    "W",
    "K",
    "Y",
    "X",
    "DilationH",
    "DilationW",
    "StrideH",
    "StrideW",
    "PaddingH",
    "PaddingW",
    THROUGHPUT_COLUMN,
];

/// Problem size of a 2-D convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvShape {
    pub n: i64,
    pub c: i64,
    pub hi: i64,
    pub wi: i64,
    pub k: i64,
    pub y: i64,
    pub x: i64,
    pub conv_stride_h: i64,
    pub conv_stride_w: i64,
    pub padding_h: i64,
    pub padding_w: i64,
    pub dilation_h: i64,
    pub dilation_w: i64,
    pub group: i64,
}

/// Output extent of one spatial axis:
/// `floor((input + 2*pad - (filter-1)*dilation - 1) / stride) + 1`.
///
/// `None` when the arithmetic overflows or the stride is zero.
pub fn output_size(
    input: i64,
    padding: i64,
    filter: i64,
    stride: i64,
    dilation: i64,
) -> Option<i64> {
    let padded = padding.checked_mul(2)?.checked_add(input)?;
    let span = filter.checked_sub(1)?.checked_mul(dilation)?;
    let last = padded.checked_sub(span)?.checked_sub(1)?;
    last.checked_div_euclid(stride)?.checked_add(1)
}

/// Output extent that must be at least one element.
fn positive_output_size(
    field: &str,
    input: i64,
    padding: i64,
    filter: i64,
    stride: i64,
    dilation: i64,
) -> ConfigurationResult<i64> {
    output_size(input, padding, filter, stride, dilation)
        .filter(|size| *size >= 1)
        .ok_or_else(|| {
            ConfigurationError::invalid(
                field,
                format!(
                    "input {input}, padding {padding}, filter {filter}, stride {stride}, dilation {dilation}"
                ),
            )
        })
}

/// A validated convolution benchmark configuration with derived output sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvConfiguration {
    data_type: DataType,
    direction: ConvDirection,
    layout: Layout,
    shape: ConvShape,
    arch: String,
    chip: String,
    ho: i64,
    wo: i64,
}

#[derive(Default)]
struct ConvFlags {
    direction: Option<ConvDirection>,
    layout: Option<Layout>,
    n: Option<i64>,
    c: Option<i64>,
    hi: Option<i64>,
    wi: Option<i64>,
    k: Option<i64>,
    y: Option<i64>,
    x: Option<i64>,
    conv_stride_h: Option<i64>,
    conv_stride_w: Option<i64>,
    padding_h: Option<i64>,
    padding_w: Option<i64>,
    dilation_h: Option<i64>,
    dilation_w: Option<i64>,
    group: Option<i64>,
}

fn required(value: Option<i64>, flag: &str) -> ConfigurationResult<i64> {
    value.ok_or_else(|| ConfigurationError::incomplete("convolution", flag))
}

impl ConvConfiguration {
    pub fn new(
        data_type: DataType,
        direction: ConvDirection,
        layout: Layout,
        shape: ConvShape,
        arch: &str,
    ) -> ConfigurationResult<Self> {
        for (field, value) in [
            ("n", shape.n),
            ("c", shape.c),
            ("hi", shape.hi),
            ("wi", shape.wi),
            ("k", shape.k),
            ("y", shape.y),
            ("x", shape.x),
            ("conv_stride_h", shape.conv_stride_h),
            ("conv_stride_w", shape.conv_stride_w),
            ("dilation_h", shape.dilation_h),
            ("dilation_w", shape.dilation_w),
            ("group", shape.group),
        ] {
            if value < 1 {
                return Err(ConfigurationError::invalid(field, value.to_string()));
            }
        }
        for (field, value) in [("padding_h", shape.padding_h), ("padding_w", shape.padding_w)] {
            if value < 0 {
                return Err(ConfigurationError::invalid(field, value.to_string()));
            }
        }

        let chip = chip_from_arch(arch)?;
        let ho = positive_output_size(
            "ho",
            shape.hi,
            shape.padding_h,
            shape.y,
            shape.conv_stride_h,
            shape.dilation_h,
        )?;
        let wo = positive_output_size(
            "wo",
            shape.wi,
            shape.padding_w,
            shape.x,
            shape.conv_stride_w,
            shape.dilation_w,
        )?;

        Ok(Self {
            data_type,
            direction,
            layout,
            shape,
            arch: arch.to_string(),
            chip,
            ho,
            wo,
        })
    }

    /// Parses a reference-driver style test vector, e.g.
    /// `conv -F 1 -f NCHW -I NCHW -O NCHW -n 256 -c 1024 -H 14 -W 14 ...`.
    ///
    /// The first token selects the data type. Every flag takes one value, given
    /// either as the next token or attached (`-F1`). Flags the descriptor does
    /// not use are skipped, and parsing stops at the first non-flag token.
    pub fn from_command_line<S: AsRef<str>>(argv: &[S], arch: &str) -> ConfigurationResult<Self> {
        let (first, rest) = argv
            .split_first()
            .ok_or_else(|| ConfigurationError::incomplete("convolution", "data type"))?;
        let data_type = DataType::from_conv_token(first.as_ref())?;

        let mut flags = ConvFlags::default();
        let mut tokens = rest.iter().map(AsRef::as_ref);
        while let Some(token) = tokens.next() {
            let Some(option) = token.strip_prefix('-') else {
                break;
            };
            let mut chars = option.chars();
            let Some(name) = chars.next() else {
                break;
            };
            let value = match chars.as_str() {
                "" => tokens.next().ok_or_else(|| {
                    ConfigurationError::incomplete("convolution", &format!("value for {token}"))
                })?,
                attached => attached,
            };

            match name {
                'F' => flags.direction = Some(ConvDirection::from_code(value)?),
                'f' | 'I' | 'O' => {
                    let layout = Layout::from_name(value)?;
                    match flags.layout {
                        Some(previous) if previous != layout => {
                            return Err(ConfigurationError::MixedLayouts {
                                first: previous.to_string(),
                                second: layout.to_string(),
                            });
                        }
                        _ => flags.layout = Some(layout),
                    }
                }
                'n' => flags.n = Some(parse_int("n", value)?),
                'c' => flags.c = Some(parse_int("c", value)?),
                'H' => flags.hi = Some(parse_int("hi", value)?),
                'W' => flags.wi = Some(parse_int("wi", value)?),
                'k' => flags.k = Some(parse_int("k", value)?),
                'y' => flags.y = Some(parse_int("y", value)?),
                'x' => flags.x = Some(parse_int("x", value)?),
                'u' => flags.conv_stride_h = Some(parse_int("conv_stride_h", value)?),
                'v' => flags.conv_stride_w = Some(parse_int("conv_stride_w", value)?),
                'p' => flags.padding_h = Some(parse_int("padding_h", value)?),
                'q' => flags.padding_w = Some(parse_int("padding_w", value)?),
                'l' => flags.dilation_h = Some(parse_int("dilation_h", value)?),
                'j' => flags.dilation_w = Some(parse_int("dilation_w", value)?),
                'g' => flags.group = Some(parse_int("group", value)?),
                _ => debug!("Ignoring convolution flag {} {}", token, value),
            }
        }

        let direction = flags
            .direction
            .ok_or_else(|| ConfigurationError::incomplete("convolution", "-F"))?;
        let layout = flags
            .layout
            .ok_or_else(|| ConfigurationError::incomplete("convolution", "-f/-I/-O"))?;
        let shape = ConvShape {
            n: required(flags.n, "-n")?,
            c: required(flags.c, "-c")?,
            hi: required(flags.hi, "-H")?,
            wi: required(flags.wi, "-W")?,
            k: required(flags.k, "-k")?,
            y: required(flags.y, "-y")?,
            x: required(flags.x, "-x")?,
            conv_stride_h: required(flags.conv_stride_h, "-u")?,
            conv_stride_w: required(flags.conv_stride_w, "-v")?,
            padding_h: required(flags.padding_h, "-p")?,
            padding_w: required(flags.padding_w, "-q")?,
            dilation_h: required(flags.dilation_h, "-l")?,
            dilation_w: required(flags.dilation_w, "-j")?,
            group: required(flags.group, "-g")?,
        };

        Self::new(data_type, direction, layout, shape, arch)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn direction(&self) -> ConvDirection {
        self.direction
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn shape(&self) -> &ConvShape {
        &self.shape
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    pub fn ho(&self) -> i64 {
        self.ho
    }

    pub fn wo(&self) -> i64 {
        self.wo
    }

    /// Floating point operations of one convolution: `2*n*c*k*ho*wo*y*x`.
    pub fn flop_count(&self) -> f64 {
        let s = &self.shape;
        2.0 * s.n as f64
            * s.c as f64
            * s.k as f64
            * self.ho as f64
            * self.wo as f64
            * s.y as f64
            * s.x as f64
    }

    /// Generator arguments, ending with the kernel repeat count and any extra flags.
    pub fn tool_arguments(&self, extra_flags: &str) -> Vec<String> {
        let s = &self.shape;
        let mut args: Vec<String> = vec![
            "--operation".into(),
            self.direction.generator_operation().into(),
            "-t".into(),
            self.data_type.as_str().into(),
            "--arch".into(),
            self.arch.clone(),
            "--fil_layout".into(),
            self.layout.filter_layout().into(),
            "--in_layout".into(),
            self.layout.input_layout().into(),
            "--out_layout".into(),
            self.layout.output_layout().into(),
        ];
        for (flag, value) in [
            ("--batchsize", s.n),
            ("--in_channels", s.c),
            ("--in_h", s.hi),
            ("--in_w", s.wi),
            ("--out_channels", s.k),
            ("--fil_h", s.y),
            ("--fil_w", s.x),
            ("--dilation_h", s.dilation_h),
            ("--dilation_w", s.dilation_w),
            ("--conv_stride_h", s.conv_stride_h),
            ("--conv_stride_w", s.conv_stride_w),
            ("--padding_h", s.padding_h),
            ("--padding_w", s.padding_w),
            ("--kernel-repeats", MLIR_N_REPEATS),
        ] {
            args.push(flag.to_string());
            args.push(value.to_string());
        }
        args.extend(extra_flags.split_whitespace().map(str::to_string));
        args
    }

    /// Renders the descriptor back into the reference driver's grammar.
    pub fn to_test_vector(&self) -> String {
        let s = &self.shape;
        let layout = self.layout.as_str();
        format!(
            "{} -F {} -f {layout} -I {layout} -O {layout} -n {} -c {} -H {} -W {} -k {} -y {} -x {} -p {} -q {} -u {} -v {} -l {} -j {} -g {}",
            self.data_type.conv_token(),
            self.direction.code(),
            s.n,
            s.c,
            s.hi,
            s.wi,
            s.k,
            s.y,
            s.x,
            s.padding_h,
            s.padding_w,
            s.conv_stride_h,
            s.conv_stride_w,
            s.dilation_h,
            s.dilation_w,
            s.group,
        )
    }

    /// Builds the report row for a measured total of `nanoseconds`.
    pub fn to_report_row(&self, nanoseconds: f64) -> MeasurementResult {
        let s = &self.shape;
        let values = vec![
            ReportValue::from(self.direction.as_str()),
            ReportValue::from(self.data_type.as_str()),
            ReportValue::from(self.chip.as_str()),
            ReportValue::from(self.layout.filter_layout()),
            ReportValue::from(self.layout.input_layout()),
            ReportValue::from(self.layout.output_layout()),
            s.n.into(),
            s.c.into(),
            s.hi.into(),
            s.wi.into(),
            s.k.into(),
            s.y.into(),
            s.x.into(),
            s.dilation_h.into(),
            s.dilation_w.into(),
            s.conv_stride_h.into(),
            s.conv_stride_w.into(),
            s.padding_h.into(),
            s.padding_w.into(),
            compute_tflops(self.flop_count(), nanoseconds).into(),
        ];
        MeasurementResult::from_columns(&CONV_TABLE_COLUMNS, values)
    }

    /// Name of the reference library solver that runs the generated kernel
    /// for this direction, with the matrix-core suffix on chips that have one.
    pub fn solver_name(&self) -> String {
        let base = match self.direction {
            ConvDirection::Forward => "ConvMlirIgemmFwd",
            ConvDirection::BackwardData => "ConvMlirIgemmBwd",
            ConvDirection::BackwardWeight => "ConvMlirIgemmWrW",
        };
        if XDLOPS_CHIPS.contains(&self.chip.as_str()) {
            format!("{base}Xdlops")
        } else {
            base.to_string()
        }
    }
}

/// Chips with matrix acceleration units.
pub const XDLOPS_CHIPS: [&str; 2] = ["gfx908", "gfx90a"];
