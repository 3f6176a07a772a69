//! gemmbench CLI Library
//!
//! Drives external GEMM benchmark tools across the GPUs of one machine,
//! keeps the best measurement per configuration and persists result rows.
//!
//! # Example
//!
//! ```text
//! gemmbench -t "AMD MI100" -d 0,1 -z "s,c,0,0,1024,1024,1024,1.0,0.0,1024,1024,1024" \
//!     --rocblas /opt/rocm/bin/rocblas-gemm
//! ```

pub mod backend;
pub mod config;
pub mod executor;
pub mod git;
pub mod parse;
pub mod planner;
pub mod runner;
pub mod system;

pub use backend::{Backend, BackendContext, BackendError};
pub use config::{ArgsError, ConfigSource, RunConfig};
pub use executor::{load_configs, run_pipeline, RunOutcome};
pub use runner::{Invocation, ProcessRunner, RunError, ToolOutput, ToolRunner};
pub use system::{prepare_system, SystemProfile, Target};

use clap::Parser;
use gemmbench_report::DocumentStore;
use std::path::PathBuf;

/// gemmbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "gemmbench")]
#[command(author, version, about = "GEMM benchmark driver for GPU BLAS and kernel tools")]
pub struct Cli {
    /// Comma separated GPU ids to benchmark on
    #[arg(short, long, default_value = "0,1,2,3")]
    pub devices: String,

    /// Benchmark configuration CSV file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Inline configuration rows, separated by ';'
    #[arg(short = 'z', long)]
    pub string: Option<String>,

    /// Branch name recorded with results (defaults to the checked out branch)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Target device name, e.g. "AMD MI100" or "NVidia RTX A6000"
    #[arg(short, long)]
    pub target: Option<String>,

    /// Output path prefix for tool artifacts and reports
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// rocBLAS benchmark tool
    #[arg(long, alias = "roc")]
    pub rocblas: Option<PathBuf>,

    /// cuBLAS benchmark tool
    #[arg(long, alias = "cu")]
    pub cublas: Option<PathBuf>,

    /// composable-kernel profiler
    #[arg(long = "composable-kernel", alias = "ck")]
    pub composable_kernel: Option<PathBuf>,

    /// CUTLASS profiler
    #[arg(long, alias = "cl")]
    pub cutlass: Option<PathBuf>,

    /// In-house benchmark harness, used when no baseline tool is given
    #[arg(long, env = "GEMMBENCH_HARNESS")]
    pub harness: Option<PathBuf>,

    /// Collection to upload harness results to
    #[arg(short, long)]
    pub upload: Option<String>,

    /// Document store root directory
    #[arg(long, env = "GEMMBENCH_STORE", default_value = "benchmark_store")]
    pub store: PathBuf,

    /// Local report format: json, csv, all
    #[arg(long, default_value = "all")]
    pub report_format: String,

    /// Verify kernel correctness in the harness
    #[arg(short, long)]
    pub check: bool,

    /// Remove the output directory after the run
    #[arg(short, long)]
    pub janitor: bool,

    /// Print the invocations without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the gemmbench CLI with process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the gemmbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let level = if cli.verbose { "gemmbench=debug" } else { "gemmbench=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    let config = RunConfig::from_cli(&cli)?;
    let store = DocumentStore::new(&config.store_root);
    run_pipeline(&config, &ProcessRunner, &store)?;

    Ok(())
}
