//! gemmbench Report - Persistence and Reporting
//!
//! - Document store collections for result rows
//! - Historical summaries against earlier commits
//! - CSV and JSON run reports

mod csv;
mod json;
mod store;
mod summary;

pub use self::csv::{generate_csv_report, CSV_COLUMNS};
pub use json::{generate_json_report, RunReport};
pub use store::{validate_collection, DocumentStore, ResultStore, StoreError, UpsertStats};
pub use summary::{format_summary, summarize, ShapeSummary};

/// Local report format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// JSON with rows and summary
    Json,
    /// CSV for spreadsheets
    Csv,
    /// Both of the above
    All,
}

impl ReportFormat {
    pub fn includes_json(self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::All)
    }

    pub fn includes_csv(self) -> bool {
        matches!(self, ReportFormat::Csv | ReportFormat::All)
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "all" | "both" => Ok(ReportFormat::All),
            other => Err(format!("Unknown report format: {}", other)),
        }
    }
}

#[cfg(test)]
mod test_support {
    use chrono::DateTime;
    use gemmbench_core::{
        BenchmarkResult, CommitInfo, DataType, GemmOpts, Order, ResultRow, TargetRuntime,
    };

    /// Square fp32 row for `commit` with the given throughput.
    pub fn row(commit: &str, size: u64, tflops: f64) -> ResultRow {
        let opts = GemmOpts {
            data_type: DataType::Single,
            order: Order::ColumnMajor,
            trans_a: false,
            trans_b: false,
            m: size,
            n: size,
            k: size,
            alpha: 1.0,
            beta: 0.0,
            lda: size,
            ldb: size,
            ldc: size,
        };
        let commit = CommitInfo {
            id: commit.to_string(),
            datetime: DateTime::parse_from_rfc3339("2024-05-01T08:30:00+00:00").unwrap(),
            branch: "main".to_string(),
        };
        let mut result = BenchmarkResult::new(opts, 0, commit, "AMD MI100", TargetRuntime::Rocm);
        result.record(1.5, tflops, "");
        result.into_row("rocblas")
    }
}
