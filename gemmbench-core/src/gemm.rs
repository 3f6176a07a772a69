//! GEMM Problem Description
//!
//! One benchmark input row: datatype, layout, shape, scalars and leading
//! dimensions of a `C = alpha * op(A) * op(B) + beta * C` call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column order of the configuration CSV.
///
/// The first line of every configuration source is a header and is skipped;
/// columns are always read in this order regardless of the header text.
pub const CONFIG_HEADERS: [&str; 12] = [
    "type", "order", "transA", "transB", "m", "n", "k", "alpha", "beta", "lda", "ldb", "ldc",
];

/// Element type of the operation, using the BLAS precision prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// fp32 (`sgemm`)
    #[serde(rename = "s")]
    Single,
    /// fp64 (`dgemm`)
    #[serde(rename = "d")]
    Double,
    /// fp16 (`hgemm`)
    #[serde(rename = "h")]
    Half,
}

impl DataType {
    /// Single-character BLAS code
    pub fn code(self) -> char {
        match self {
            DataType::Single => 's',
            DataType::Double => 'd',
            DataType::Half => 'h',
        }
    }

    pub fn is_single(self) -> bool {
        self == DataType::Single
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" => Ok(DataType::Single),
            "d" => Ok(DataType::Double),
            "h" => Ok(DataType::Half),
            other => Err(format!("unknown datatype '{}', expected one of s, d, h", other)),
        }
    }
}

/// Storage order of the matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    #[serde(rename = "c")]
    ColumnMajor,
    #[serde(rename = "r")]
    RowMajor,
}

impl Order {
    pub fn code(self) -> char {
        match self {
            Order::ColumnMajor => 'c',
            Order::RowMajor => 'r',
        }
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "c" | "col" | "column" => Ok(Order::ColumnMajor),
            "r" | "row" => Ok(Order::RowMajor),
            other => Err(format!("unknown storage order '{}', expected c or r", other)),
        }
    }
}

/// Parse a transpose flag. Accepts `0/1`, `true/false` and BLAS-style `n/t`.
pub fn parse_flag(s: &str) -> Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "t" => Ok(true),
        "0" | "false" | "n" | "f" => Ok(false),
        other => Err(format!("invalid transpose flag '{}'", other)),
    }
}

/// A single GEMM benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemmOpts {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub order: Order,
    #[serde(rename = "transA")]
    pub trans_a: bool,
    #[serde(rename = "transB")]
    pub trans_b: bool,
    pub m: u64,
    pub n: u64,
    pub k: u64,
    pub alpha: f64,
    pub beta: f64,
    pub lda: u64,
    pub ldb: u64,
    pub ldc: u64,
}

impl GemmOpts {
    /// Positional arguments understood by the BLAS-style benchmark tools:
    /// `type m n k transA transB alpha beta lda ldb ldc gpu_id`.
    pub fn tool_args(&self, gpu_id: usize) -> Vec<String> {
        vec![
            self.data_type.to_string(),
            self.m.to_string(),
            self.n.to_string(),
            self.k.to_string(),
            u8::from(self.trans_a).to_string(),
            u8::from(self.trans_b).to_string(),
            format_scalar(self.alpha),
            format_scalar(self.beta),
            self.lda.to_string(),
            self.ldb.to_string(),
            self.ldc.to_string(),
            gpu_id.to_string(),
        ]
    }

    /// Stable key identifying the problem shape, e.g. `s_1024_1024_512_NT`.
    pub fn shape_key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}{}",
            self.data_type,
            self.m,
            self.n,
            self.k,
            if self.trans_a { 'T' } else { 'N' },
            if self.trans_b { 'T' } else { 'N' },
        )
    }

    /// Key identifying the whole configuration row, e.g.
    /// `s_1024_1024_512_NT_c_1.0_0.0_1024_512_1024`.
    ///
    /// Rows that differ in any column get different keys.
    pub fn config_key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}",
            self.shape_key(),
            self.order.code(),
            format_scalar(self.alpha),
            format_scalar(self.beta),
            self.lda,
            self.ldb,
            self.ldc,
        )
    }

    /// Floating point operations performed by one call.
    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64
    }
}

impl fmt::Display for GemmOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}gemm m={} n={} k={} transA={} transB={} alpha={} beta={} lda={} ldb={} ldc={}",
            self.data_type,
            self.m,
            self.n,
            self.k,
            u8::from(self.trans_a),
            u8::from(self.trans_b),
            format_scalar(self.alpha),
            format_scalar(self.beta),
            self.lda,
            self.ldb,
            self.ldc,
        )
    }
}

/// Render a scalar the way the tools expect it (`1.0`, not `1`).
pub fn format_scalar(v: f64) -> String {
    format!("{:?}", v)
}
