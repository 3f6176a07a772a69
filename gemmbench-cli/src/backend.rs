//! Benchmark Backends
//!
//! One external tool family per variant. A backend turns a [`GemmOpts`] into
//! process invocations, runs them and keeps the best measurement.

use crate::parse::{
    parse_blas_output, parse_ck_output, parse_cutlass_report, parse_harness_output, Measurement,
};
use crate::runner::{Invocation, RunError, ToolRunner};
use crate::system::SystemProfile;
use gemmbench_core::{
    format_scalar, BenchmarkResult, CommitInfo, DeviceMask, GemmOpts, TargetRuntime,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("{backend} produced malformed output: {reason}")]
    MalformedOutput {
        backend: &'static str,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    ResultFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no GPU device selected")]
    NoDevices,
}

/// The external tool a run is driven by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Rocblas(PathBuf),
    Cublas(PathBuf),
    ComposableKernel(PathBuf),
    Cutlass(PathBuf),
    /// In-house benchmark harness
    Harness(PathBuf),
}

/// Everything a backend needs besides the configuration itself.
pub struct BackendContext<'a> {
    pub runner: &'a dyn ToolRunner,
    pub devices: &'a DeviceMask,
    pub commit: &'a CommitInfo,
    pub target_name: &'a str,
    pub profile: &'a SystemProfile,
    pub output_prefix: &'a Path,
    pub check: bool,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Rocblas(_) => "rocblas",
            Backend::Cublas(_) => "cublas",
            Backend::ComposableKernel(_) => "composable_kernel",
            Backend::Cutlass(_) => "cutlass",
            Backend::Harness(_) => "harness",
        }
    }

    pub fn tool(&self) -> &Path {
        match self {
            Backend::Rocblas(p)
            | Backend::Cublas(p)
            | Backend::ComposableKernel(p)
            | Backend::Cutlass(p)
            | Backend::Harness(p) => p,
        }
    }

    pub fn is_baseline(&self) -> bool {
        !matches!(self, Backend::Harness(_))
    }

    /// Runtime recorded with results. The harness follows the target.
    pub fn runtime(&self, profile: &SystemProfile) -> TargetRuntime {
        match self {
            Backend::Rocblas(_) | Backend::ComposableKernel(_) => TargetRuntime::Rocm,
            Backend::Cublas(_) | Backend::Cutlass(_) => TargetRuntime::Cuda,
            Backend::Harness(_) => profile.runtime.unwrap_or(TargetRuntime::Rocm),
        }
    }

    /// Collection results are uploaded to. Baselines always upload under
    /// their own name; harness results only when a destination is given.
    pub fn collection(&self, upload: Option<&str>) -> Option<String> {
        if self.is_baseline() {
            Some(self.name().to_string())
        } else {
            upload.map(str::to_string)
        }
    }

    /// Invocations for one configuration, paired with the GPU each targets.
    pub fn invocations(
        &self,
        opts: &GemmOpts,
        devices: &DeviceMask,
        output_prefix: &Path,
        check: bool,
    ) -> Vec<(usize, Invocation)> {
        match self {
            Backend::Rocblas(tool) | Backend::Cublas(tool) => devices
                .enabled()
                .map(|gpu| (gpu, blas_invocation(tool, opts, gpu)))
                .collect(),
            Backend::Harness(tool) => devices
                .enabled()
                .map(|gpu| (gpu, harness_invocation(tool, opts, gpu, output_prefix, check)))
                .collect(),
            Backend::ComposableKernel(tool) => devices
                .first_enabled()
                .map(|gpu| (gpu, ck_invocation(tool, opts, gpu)))
                .into_iter()
                .collect(),
            Backend::Cutlass(tool) => devices
                .first_enabled()
                .map(|gpu| (gpu, cutlass_invocation(tool, opts, gpu, output_prefix)))
                .into_iter()
                .collect(),
        }
    }

    /// Benchmark one configuration.
    ///
    /// `Ok(None)` means the tool ran but reported no result for this
    /// configuration, and no row should be written.
    pub fn benchmark(
        &self,
        ctx: &BackendContext<'_>,
        opts: &GemmOpts,
    ) -> Result<Option<BenchmarkResult>, BackendError> {
        let invocations = self.invocations(opts, ctx.devices, ctx.output_prefix, ctx.check);
        if invocations.is_empty() {
            return Err(BackendError::NoDevices);
        }

        let best = match self {
            Backend::Rocblas(_) | Backend::Cublas(_) => self.run_blas(ctx, &invocations)?,
            Backend::ComposableKernel(_) => self.run_ck(ctx, &invocations)?,
            Backend::Cutlass(_) => self.run_cutlass(ctx, &invocations)?,
            Backend::Harness(_) => self.run_harness(ctx, &invocations)?,
        };
        let Some(best) = best else {
            return Ok(None);
        };

        let mut result = BenchmarkResult::new(
            opts.clone(),
            best.gpu,
            ctx.commit.clone(),
            ctx.target_name,
            self.runtime(ctx.profile),
        );
        result.device_properties = ctx.profile.device_properties(best.gpu).to_string();
        result.compiler_version = ctx.profile.compiler_version.clone();
        result.record(best.measurement.time_ms, best.measurement.tflops, best.prog_out);
        result.correct = best.correct;
        result.kernel = best.kernel;

        Ok(Some(result))
    }

    fn malformed(&self, reason: String) -> BackendError {
        BackendError::MalformedOutput {
            backend: self.name(),
            reason,
        }
    }

    /// One run per GPU, highest throughput wins.
    fn run_blas(
        &self,
        ctx: &BackendContext<'_>,
        invocations: &[(usize, Invocation)],
    ) -> Result<Option<Best>, BackendError> {
        let mut best = Best::empty(invocations[0].0, String::new());

        for (gpu, invocation) in invocations {
            tracing::debug!(gpu, command = %invocation, "running BLAS baseline");
            let output = ctx.runner.run_checked(invocation)?;
            tracing::debug!(gpu, "{}", output.stdout.trim_end());

            let measurement = parse_blas_output(&output.stdout).map_err(|r| self.malformed(r))?;
            best.offer(Best::single(*gpu, measurement, output.stdout));
        }

        Ok(Some(best))
    }

    fn run_ck(
        &self,
        ctx: &BackendContext<'_>,
        invocations: &[(usize, Invocation)],
    ) -> Result<Option<Best>, BackendError> {
        let (gpu, invocation) = &invocations[0];
        let output = ctx.runner.run_checked(invocation)?;
        tracing::debug!(gpu, "{}", output.stdout.trim_end());

        match parse_ck_output(&output.stdout).map_err(|r| self.malformed(r))? {
            Some((measurement, line)) => {
                tracing::info!("{}", line);
                Ok(Some(Best::single(*gpu, measurement, output.stdout)))
            }
            None => {
                tracing::warn!("composable_kernel reported no result, skipping");
                Ok(None)
            }
        }
    }

    fn run_cutlass(
        &self,
        ctx: &BackendContext<'_>,
        invocations: &[(usize, Invocation)],
    ) -> Result<Option<Best>, BackendError> {
        let (gpu, invocation) = &invocations[0];
        let output = ctx.runner.run_checked(invocation)?;
        tracing::debug!(gpu, "{}", output.stdout.trim_end());

        let path = cutlass_report_path(ctx.output_prefix);
        let content = std::fs::read_to_string(&path).map_err(|source| BackendError::ResultFile {
            path: path.display().to_string(),
            source,
        })?;
        let measurement = parse_cutlass_report(&content).map_err(|r| self.malformed(r))?;
        tracing::info!("Max throughput: {} TFlops", measurement.tflops);

        Ok(Some(Best::single(*gpu, measurement, output.stdout)))
    }

    /// One run per GPU; every variant of every GPU competes.
    ///
    /// When every reported variant failed verification the configuration is
    /// recorded as incorrect; when none were reported it is skipped.
    fn run_harness(
        &self,
        ctx: &BackendContext<'_>,
        invocations: &[(usize, Invocation)],
    ) -> Result<Option<Best>, BackendError> {
        let mut best: Option<Best> = None;
        let mut rejected: Option<Best> = None;

        for (gpu, invocation) in invocations {
            let output = ctx.runner.run_checked(invocation)?;
            tracing::debug!(gpu, "{}", output.stdout.trim_end());

            let variants = parse_harness_output(&output.stdout).map_err(|r| self.malformed(r))?;
            if variants.is_empty() {
                tracing::warn!(gpu, "harness reported no kernel variants");
            }
            for variant in variants {
                if variant.correct == Some(false) {
                    tracing::warn!(gpu, variant = %variant.name, "variant failed verification");
                    rejected.get_or_insert_with(|| Best {
                        correct: Some(false),
                        kernel: Some(variant.name.clone()),
                        ..Best::empty(*gpu, output.stdout.clone())
                    });
                    continue;
                }
                let candidate = Best {
                    gpu: *gpu,
                    measurement: variant.measurement,
                    prog_out: output.stdout.clone(),
                    correct: variant.correct,
                    kernel: Some(variant.name),
                };
                if let Some(current) = best.as_mut() {
                    current.offer(candidate);
                } else {
                    best = Some(candidate);
                }
            }
        }

        if best.is_none() && rejected.is_none() {
            tracing::warn!("harness reported no result, skipping");
        }
        Ok(best.or(rejected))
    }
}

/// Best measurement seen so far for one configuration.
#[derive(Debug)]
struct Best {
    gpu: usize,
    measurement: Measurement,
    prog_out: String,
    correct: Option<bool>,
    kernel: Option<String>,
}

impl Best {
    fn empty(gpu: usize, prog_out: String) -> Self {
        Self {
            gpu,
            measurement: Measurement {
                time_ms: 0.0,
                tflops: 0.0,
            },
            prog_out,
            correct: None,
            kernel: None,
        }
    }

    fn single(gpu: usize, measurement: Measurement, prog_out: String) -> Self {
        Self {
            gpu,
            measurement,
            prog_out,
            correct: None,
            kernel: None,
        }
    }

    /// Strictly higher throughput replaces, so ties keep the earlier GPU.
    fn offer(&mut self, candidate: Best) {
        if candidate.measurement.tflops > self.measurement.tflops {
            *self = candidate;
        }
    }
}

fn blas_invocation(tool: &Path, opts: &GemmOpts, gpu: usize) -> Invocation {
    Invocation::new(tool).args(opts.tool_args(gpu))
}

fn harness_invocation(
    tool: &Path,
    opts: &GemmOpts,
    gpu: usize,
    output_prefix: &Path,
    check: bool,
) -> Invocation {
    let mut invocation = Invocation::new(tool)
        .args(opts.tool_args(gpu))
        .arg("--output")
        .arg(output_prefix.display().to_string());
    if check {
        invocation = invocation.arg("--check");
    }
    invocation
}

/// composable-kernel profiler: `gemm <datatype> <layout> <verify> <init>
/// <log> <time> M N K StrideA StrideB StrideC`.
fn ck_invocation(tool: &Path, opts: &GemmOpts, gpu: usize) -> Invocation {
    let datatype = if opts.data_type.is_single() { "0" } else { "1" };
    let layout = match (opts.trans_a, opts.trans_b) {
        (false, false) => "0",
        (false, true) => "1",
        (true, false) => "2",
        (true, true) => "3",
    };
    let lda = if opts.trans_a { opts.k } else { opts.m };
    let ldb = if opts.trans_b { opts.n } else { opts.k };
    let ldc = opts.m;

    Invocation::new(tool)
        .args(["gemm", datatype, layout, "0", "0", "0", "2"])
        .args([opts.m, opts.n, opts.k, lda, ldb, ldc].map(|v| v.to_string()))
        .env("HIP_VISIBLE_DEVICES", gpu.to_string())
}

fn cutlass_output_base(output_prefix: &Path) -> String {
    format!("{}_cutlass", output_prefix.display())
}

/// The profiler appends `.gemm.csv` to the `--output` it is given.
pub fn cutlass_report_path(output_prefix: &Path) -> PathBuf {
    PathBuf::from(format!("{}.gemm.csv", cutlass_output_base(output_prefix)))
}

fn cutlass_invocation(tool: &Path, opts: &GemmOpts, gpu: usize, output_prefix: &Path) -> Invocation {
    let datatype = if opts.data_type.is_single() { "f32" } else { "f16" };
    let layout_a = if opts.trans_a { "t" } else { "n" };
    let layout_b = if opts.trans_b { "t" } else { "n" };

    Invocation::new(tool)
        .args([
            "--operation=Gemm".to_string(),
            format!("--A={}:{}", datatype, layout_a),
            format!("--B={}:{}", datatype, layout_b),
            format!("--C={}:*", datatype),
            format!("--m={}", opts.m),
            format!("--n={}", opts.n),
            format!("--k={}", opts.k),
            format!("--alpha={}", format_scalar(opts.alpha)),
            format!("--beta={}", format_scalar(opts.beta)),
            "--op_class=tensorop".to_string(),
            format!("--output={}", cutlass_output_base(output_prefix)),
        ])
        .env("CUDA_VISIBLE_DEVICES", gpu.to_string())
}
