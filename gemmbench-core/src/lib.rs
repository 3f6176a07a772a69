//! gemmbench Core - Benchmark Model
//!
//! Types shared by the benchmark driver and the reporting layer:
//! - GEMM configurations and their CSV loading
//! - GPU device selection
//! - Benchmark results and the result documents persisted for them

mod config;
mod devices;
mod gemm;
mod result;

pub use config::{load_config_file, load_config_str, parse_config, ConfigError};
pub use devices::{DeviceError, DeviceMask};
pub use gemm::{format_scalar, parse_flag, DataType, GemmOpts, Order, CONFIG_HEADERS};
pub use result::{BenchmarkResult, CommitInfo, ResultRow, TargetRuntime};
