//! Benchmark results and the documents persisted for them.

use crate::gemm::GemmOpts;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Git state the benchmarked code was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub datetime: DateTime<FixedOffset>,
    pub branch: String,
}

/// GPU runtime the backend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetRuntime {
    Rocm,
    Cuda,
}

impl fmt::Display for TargetRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRuntime::Rocm => write!(f, "ROCM"),
            TargetRuntime::Cuda => write!(f, "CUDA"),
        }
    }
}

/// Outcome of benchmarking one configuration.
///
/// Created with the environment filled in, then updated with whatever the
/// backend measured before being turned into a [`ResultRow`].
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub opts: GemmOpts,
    pub gpu_id: usize,
    pub commit: CommitInfo,
    pub target_name: String,
    pub target_rt: TargetRuntime,
    pub device_properties: String,
    pub compiler_version: String,
    pub compilable: bool,
    pub executable: bool,
    pub correct: Option<bool>,
    pub kernel: Option<String>,
    pub time_ms: f64,
    pub tflops: f64,
    pub prog_out: String,
}

impl BenchmarkResult {
    pub fn new(
        opts: GemmOpts,
        gpu_id: usize,
        commit: CommitInfo,
        target_name: impl Into<String>,
        target_rt: TargetRuntime,
    ) -> Self {
        Self {
            opts,
            gpu_id,
            commit,
            target_name: target_name.into(),
            target_rt,
            device_properties: String::new(),
            compiler_version: String::new(),
            compilable: false,
            executable: false,
            correct: None,
            kernel: None,
            time_ms: 0.0,
            tflops: 0.0,
            prog_out: String::new(),
        }
    }

    /// Record a successful measurement.
    pub fn record(&mut self, time_ms: f64, tflops: f64, prog_out: impl Into<String>) {
        self.compilable = true;
        self.executable = true;
        self.time_ms = time_ms;
        self.tflops = tflops;
        self.prog_out = prog_out.into();
    }

    /// Deterministic document id: one document per commit, target, configuration and GPU.
    pub fn document_id(&self) -> String {
        let target: String = self
            .target_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!(
            "{}_{}_{}_gpu{}",
            self.commit.id,
            target,
            self.opts.config_key(),
            self.gpu_id
        )
    }

    pub fn into_row(self, backend: &str) -> ResultRow {
        ResultRow {
            id: self.document_id(),
            opts: self.opts,
            gpu_id: self.gpu_id,
            commit_id: self.commit.id,
            commit_datetime: self.commit.datetime,
            commit_branch: self.commit.branch,
            target_name: self.target_name,
            target_rt: self.target_rt,
            device_properties: self.device_properties,
            compiler_version: self.compiler_version,
            backend: backend.to_string(),
            compilable: self.compilable,
            executable: self.executable,
            correct: self.correct,
            kernel: self.kernel,
            time_ms: self.time_ms,
            tflops: self.tflops,
            prog_out: self.prog_out,
            timestamp: Utc::now(),
        }
    }
}

/// A stored result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: String,
    #[serde(flatten)]
    pub opts: GemmOpts,
    pub gpu_id: usize,
    pub commit_id: String,
    pub commit_datetime: DateTime<FixedOffset>,
    pub commit_branch: String,
    pub target_name: String,
    pub target_rt: TargetRuntime,
    #[serde(rename = "deviceProperties")]
    pub device_properties: String,
    pub compiler_version: String,
    pub backend: String,
    pub compilable: bool,
    pub executable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    pub time_ms: f64,
    #[serde(rename = "TFlops")]
    pub tflops: f64,
    pub prog_out: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemm::{DataType, Order};

    fn commit() -> CommitInfo {
        CommitInfo {
            id: "3f2c1ab".to_string(),
            datetime: DateTime::parse_from_rfc3339("2024-03-01T12:00:00+01:00").unwrap(),
            branch: "main".to_string(),
        }
    }

    fn opts() -> GemmOpts {
        GemmOpts {
            data_type: DataType::Half,
            order: Order::ColumnMajor,
            trans_a: true,
            trans_b: false,
            m: 256,
            n: 256,
            k: 64,
            alpha: 1.0,
            beta: 0.0,
            lda: 64,
            ldb: 64,
            ldc: 256,
        }
    }

    #[test]
    fn fresh_result_is_unmeasured() {
        let result = BenchmarkResult::new(opts(), 1, commit(), "AMD MI100", TargetRuntime::Rocm);
        assert!(!result.compilable);
        assert!(!result.executable);
        assert_eq!(result.tflops, 0.0);
    }

    #[test]
    fn document_id_is_stable_and_sanitized() {
        let result = BenchmarkResult::new(opts(), 1, commit(), "AMD MI100", TargetRuntime::Rocm);
        assert_eq!(result.document_id(), "3f2c1ab_AMD_MI100_h_256_256_64_TN_c_1.0_0.0_64_64_256_gpu1");
    }

    #[test]
    fn rows_of_one_shape_get_distinct_ids() {
        let mut accumulate = opts();
        accumulate.beta = 1.0;
        let mut padded = opts();
        padded.ldc = 512;

        let ids: Vec<String> = [opts(), accumulate, padded]
            .into_iter()
            .map(|o| BenchmarkResult::new(o, 0, commit(), "AMD MI100", TargetRuntime::Rocm))
            .map(|r| r.document_id())
            .collect();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[0], ids[2]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn row_uses_document_field_names() {
        let mut result =
            BenchmarkResult::new(opts(), 0, commit(), "NVidia RTX A6000", TargetRuntime::Cuda);
        result.record(0.25, 31.5, "h,256,256,64,0.25,31.5\n");
        let row = result.into_row("cublas");
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["TFlops"], 31.5);
        assert_eq!(value["transA"], true);
        assert_eq!(value["target_rt"], "CUDA");
        assert_eq!(value["backend"], "cublas");
        assert_eq!(value["commit_id"], "3f2c1ab");
        assert!(value.get("correct").is_none());

        let back: ResultRow = serde_json::from_value(value).unwrap();
        assert_eq!(back, row);
    }
}
