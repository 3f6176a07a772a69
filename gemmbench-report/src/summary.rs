//! Historical Summary
//!
//! Compares the configurations measured by one commit against the best
//! result any other commit recorded in the same collection.

use gemmbench_core::ResultRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Comparison of one configuration against history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeSummary {
    /// [`GemmOpts::config_key`](gemmbench_core::GemmOpts::config_key) of the row
    pub config: String,
    pub tflops: f64,
    pub time_ms: f64,
    pub gpu_id: usize,
    /// Best throughput of any other commit, with that commit's id
    pub best_previous: Option<(f64, String)>,
}

impl ShapeSummary {
    /// Percentage change relative to the best previous throughput.
    pub fn relative_change(&self) -> Option<f64> {
        self.best_previous.as_ref().and_then(|(best, _)| {
            if *best > 0.0 {
                Some((self.tflops - best) / best * 100.0)
            } else {
                None
            }
        })
    }
}

/// Summarize the rows `commit_id` contributed to a collection.
pub fn summarize(rows: &[ResultRow], commit_id: &str) -> Vec<ShapeSummary> {
    let mut current: BTreeMap<String, &ResultRow> = BTreeMap::new();
    let mut history: BTreeMap<String, &ResultRow> = BTreeMap::new();

    for row in rows {
        let bucket = if row.commit_id == commit_id {
            &mut current
        } else {
            &mut history
        };
        let entry = bucket.entry(row.opts.config_key()).or_insert(row);
        if row.tflops > entry.tflops {
            *entry = row;
        }
    }

    current
        .into_iter()
        .map(|(config, row)| {
            let best_previous = history
                .get(&config)
                .map(|prev| (prev.tflops, prev.commit_id.clone()));
            ShapeSummary {
                config,
                tflops: row.tflops,
                time_ms: row.time_ms,
                gpu_id: row.gpu_id,
                best_previous,
            }
        })
        .collect()
}

/// Format a summary table for terminal output.
pub fn format_summary(collection: &str, commit_id: &str, summaries: &[ShapeSummary]) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("Benchmark Summary: {} @ {}\n", collection, commit_id));
    output.push_str(&"=".repeat(88));
    output.push('\n');

    if summaries.is_empty() {
        output.push_str("  no results recorded for this commit\n");
        return output;
    }

    output.push_str(&format!(
        "  {:<44} {:>4} {:>10} {:>10} {:>10} {:>8}\n",
        "config", "gpu", "time_ms", "TFlops", "best_prev", "change"
    ));
    output.push_str(&"-".repeat(88));
    output.push('\n');

    let mut regressions = 0;
    let mut improvements = 0;
    for s in summaries {
        let best = s
            .best_previous
            .as_ref()
            .map(|(tflops, _)| format!("{:.3}", tflops))
            .unwrap_or_else(|| "-".to_string());
        let change = match s.relative_change() {
            Some(c) => {
                if c < -5.0 {
                    regressions += 1;
                } else if c > 5.0 {
                    improvements += 1;
                }
                format!("{:+.1}%", c)
            }
            None => "new".to_string(),
        };
        output.push_str(&format!(
            "  {:<44} {:>4} {:>10.4} {:>10.3} {:>10} {:>8}\n",
            s.config, s.gpu_id, s.time_ms, s.tflops, best, change
        ));
    }

    output.push_str(&"-".repeat(88));
    output.push('\n');
    output.push_str(&format!(
        "  Configurations: {}  Regressions: {}  Improvements: {}\n",
        summaries.len(),
        regressions,
        improvements
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::row;

    #[test]
    fn compares_against_best_other_commit() {
        let rows = vec![
            row("old1", 1024, 10.0),
            row("old2", 1024, 14.0),
            row("new", 1024, 12.6),
            row("new", 2048, 20.0),
            row("old1", 4096, 30.0),
        ];

        let summaries = summarize(&rows, "new");
        assert_eq!(summaries.len(), 2);

        let s1024 = summaries.iter().find(|s| s.config.contains("_1024_")).unwrap();
        assert_eq!(s1024.tflops, 12.6);
        assert_eq!(s1024.best_previous, Some((14.0, "old2".to_string())));
        let change = s1024.relative_change().unwrap();
        assert!((change - -10.0).abs() < 1e-9);

        let s2048 = summaries.iter().find(|s| s.config.contains("_2048_")).unwrap();
        assert!(s2048.best_previous.is_none());
        assert!(s2048.relative_change().is_none());
    }

    #[test]
    fn keeps_best_gpu_of_current_commit() {
        let mut slow = row("new", 512, 5.0);
        slow.gpu_id = 0;
        let mut fast = row("new", 512, 7.0);
        fast.gpu_id = 3;
        let summaries = summarize(&[slow, fast], "new");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].gpu_id, 3);
        assert_eq!(summaries[0].tflops, 7.0);
    }

    #[test]
    fn rows_differing_in_scalars_stay_separate() {
        let plain = row("new", 256, 9.0);
        let mut accumulate = row("new", 256, 6.0);
        accumulate.opts.beta = 1.0;
        let mut padded = row("old", 256, 12.0);
        padded.opts.ldc = 512;

        let summaries = summarize(&[plain, accumulate, padded], "new");
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.best_previous.is_none()));
        assert!(summaries.iter().any(|s| s.tflops == 6.0));
    }

    #[test]
    fn formats_table() {
        let rows = vec![row("old", 1024, 10.0), row("new", 1024, 8.0)];
        let summaries = summarize(&rows, "new");
        let text = format_summary("rocblas", "new", &summaries);
        assert!(text.contains("Benchmark Summary: rocblas @ new"));
        assert!(text.contains("-20.0%"));
        assert!(text.contains("Regressions: 1"));
    }

    #[test]
    fn formats_empty_summary() {
        let text = format_summary("cutlass", "abc", &[]);
        assert!(text.contains("no results recorded"));
    }
}
