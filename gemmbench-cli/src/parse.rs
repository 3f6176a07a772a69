//! Tool Output Parsers
//!
//! Each backend reports its measurement in its own format. Parsers return a
//! plain reason string on failure; callers attach the backend name.

use regex::Regex;
use std::sync::OnceLock;

/// Time and throughput of one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub time_ms: f64,
    pub tflops: f64,
}

/// One kernel variant reported by the in-house harness.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub measurement: Measurement,
    pub correct: Option<bool>,
}

fn number(token: &str, what: &str) -> Result<f64, String> {
    let token = token.trim();
    token
        .parse::<f64>()
        .map_err(|_| format!("{} '{}' is not a number", what, token))
}

/// BLAS tools print comma separated fields ending in `time_ms,tflops`.
///
/// Only the last non-empty line is considered.
pub fn parse_blas_output(stdout: &str) -> Result<Measurement, String> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| "empty output".to_string())?;

    let tokens: Vec<&str> = line.split(',').collect();
    if tokens.len() < 2 {
        return Err(format!("expected at least 2 comma separated fields in '{}'", line));
    }

    Ok(Measurement {
        tflops: number(tokens[tokens.len() - 1], "throughput")?,
        time_ms: number(tokens[tokens.len() - 2], "time")?,
    })
}

fn ck_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Best Perf: (.+) ms, (.+) TFlops").expect("composable-kernel pattern is valid")
    })
}

/// composable-kernel prints `Best Perf: <ms> ms, <tflops> TFlops, ...`.
///
/// `Ok(None)` means the line is absent, which happens when no kernel instance
/// supports the problem.
pub fn parse_ck_output(stdout: &str) -> Result<Option<(Measurement, String)>, String> {
    let Some(caps) = ck_pattern().captures(stdout) else {
        return Ok(None);
    };
    let measurement = Measurement {
        time_ms: number(&caps[1], "time")?,
        tflops: number(&caps[2], "throughput")?,
    };
    Ok(Some((measurement, caps[0].to_string())))
}

/// CUTLASS profiler CSV: header row, then one row per kernel with
/// `..., Runtime, GB/s, GFLOPs` as the last three columns.
///
/// Returns the minimum runtime and maximum throughput in TFlops.
pub fn parse_cutlass_report(content: &str) -> Result<Measurement, String> {
    let mut best: Option<Measurement> = None;

    for (i, line) in content.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split(',').collect();
        if tokens.len() < 3 {
            return Err(format!("row {} has {} fields, expected at least 3", i + 1, tokens.len()));
        }
        let gflops = number(tokens[tokens.len() - 1], "GFLOPs")?;
        let runtime = number(tokens[tokens.len() - 3], "runtime")?;

        best = Some(match best {
            None => Measurement {
                time_ms: runtime,
                tflops: gflops / 1000.0,
            },
            Some(b) => Measurement {
                time_ms: b.time_ms.min(runtime),
                tflops: b.tflops.max(gflops / 1000.0),
            },
        });
    }

    best.ok_or_else(|| "report contains no kernel rows".to_string())
}

/// Decimal or scientific notation, nothing looser.
const FLOAT: &str = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";

fn harness_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"^\s*(?P<name>[^,\s][^,]*?)\s*,\s*(?P<time>{FLOAT})\s*,\s*(?P<tflops>{FLOAT})\s*(?:,\s*(?P<correct>[A-Za-z01]+)\s*)?$"
        ))
        .expect("harness pattern is valid")
    })
}
