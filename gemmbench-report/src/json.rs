//! JSON Output

use crate::summary::ShapeSummary;
use chrono::{DateTime, Utc};
use gemmbench_core::ResultRow;
use serde::Serialize;

/// Full record of one backend run, written next to the output prefix.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<'a> {
    pub version: &'static str,
    pub collection: &'a str,
    pub timestamp: DateTime<Utc>,
    pub results: &'a [ResultRow],
    pub summary: &'a [ShapeSummary],
}

/// Generate JSON report
pub fn generate_json_report(report: &RunReport<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
