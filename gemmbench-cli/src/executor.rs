//! Benchmark Executor
//!
//! Runs the whole pipeline: load configurations, prepare the machine, run
//! the selected backend per configuration, persist and report results.

use crate::backend::BackendContext;
use crate::config::{is_removable_dir, ConfigSource, RunConfig};
use crate::git::discover_commit;
use crate::planner::{build_plan, format_plan};
use crate::runner::ToolRunner;
use crate::system::{prepare_system, Target};
use anyhow::Context;
use chrono::Utc;
use gemmbench_core::{load_config_file, load_config_str, GemmOpts, ResultRow};
use gemmbench_report::{
    format_summary, generate_csv_report, generate_json_report, summarize, ResultStore, RunReport,
    ShapeSummary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// What a finished run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub collection: Option<String>,
    pub rows: Vec<ResultRow>,
    pub reports: Vec<PathBuf>,
    pub summary: Option<String>,
}

/// Load benchmark configurations from the configured source.
pub fn load_configs(source: &ConfigSource) -> anyhow::Result<Vec<GemmOpts>> {
    let configs = match source {
        ConfigSource::File(path) => load_config_file(path)
            .with_context(|| format!("loading configurations from {}", path.display()))?,
        ConfigSource::Inline(rows) => {
            load_config_str(rows).context("parsing inline configurations")?
        }
    };
    Ok(configs)
}

/// Run every configuration through the selected backend.
pub fn run_pipeline(
    config: &RunConfig,
    runner: &dyn ToolRunner,
    store: &dyn ResultStore,
) -> anyhow::Result<RunOutcome> {
    let configs = load_configs(&config.source)?;
    tracing::info!("Running on devices: {}", config.devices);

    if config.dry_run {
        print!("{}", format_plan(&build_plan(config, &configs)));
        return Ok(RunOutcome::default());
    }

    let output_dir = config.output_dir();
    tracing::info!("Clean the output directory...");
    clean_dir(&output_dir)?;

    tracing::info!("started at {}", Utc::now());

    let profile = prepare_system(runner, Target::from_name(&config.target_name), &config.devices);
    let commit = discover_commit(runner, config.branch.as_deref())
        .context("determining the benchmarked commit")?;
    tracing::info!(commit = %commit.id, branch = %commit.branch, "tagging results");

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let backend = &config.backend;
    tracing::info!("Running {} benchmarks", backend.name());

    let ctx = BackendContext {
        runner,
        devices: &config.devices,
        commit: &commit,
        target_name: &config.target_name,
        profile: &profile,
        output_prefix: &config.output_prefix,
        check: config.check,
    };

    let pb = ProgressBar::new(configs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut rows = Vec::with_capacity(configs.len());
    for opts in &configs {
        pb.set_message(opts.shape_key());
        tracing::info!("Processing input: {}", opts);

        let result = backend
            .benchmark(&ctx, opts)
            .with_context(|| format!("benchmarking {}", opts))?;

        if let Some(result) = result {
            tracing::info!(
                gpu = result.gpu_id,
                time_ms = result.time_ms,
                tflops = result.tflops,
                "best result"
            );
            rows.push(result.into_row(backend.name()));
        }
        pb.inc(1);
    }
    pb.finish_with_message("Complete");

    let mut outcome = RunOutcome {
        collection: config.collection(),
        ..Default::default()
    };

    let summaries = match &outcome.collection {
        Some(collection) => {
            let stats = store
                .upsert(collection, &rows)
                .with_context(|| format!("uploading results to {}", collection))?;
            tracing::info!(
                collection = %collection,
                inserted = stats.inserted,
                replaced = stats.replaced,
                "results uploaded"
            );

            let history = store
                .load(collection)
                .with_context(|| format!("reading back {}", collection))?;
            let summaries = summarize(&history, &commit.id);
            let text = format_summary(collection, &commit.id, &summaries);
            print!("{}", text);
            outcome.summary = Some(text);
            summaries
        }
        None => summarize(&rows, &commit.id),
    };

    outcome.reports = write_reports(config, &rows, &summaries)?;
    for path in &outcome.reports {
        tracing::info!("Report written to: {}", path.display());
    }

    if config.janitor {
        tracing::info!("Cleaning up output directory after benchmark");
        clean_dir_except(&output_dir, &outcome.reports)?;
    }

    tracing::info!("finished at {}", Utc::now());

    outcome.rows = rows;
    Ok(outcome)
}

/// Remove the output directory if it is safe to do so.
fn clean_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    if !is_removable_dir(dir) {
        tracing::warn!("not removing {}: it is the working directory or a root", dir.display());
        return Ok(());
    }
    std::fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))
}

/// Remove everything in the output directory except the run's reports.
fn clean_dir_except(dir: &Path, keep: &[PathBuf]) -> anyhow::Result<()> {
    if keep.is_empty() {
        return clean_dir(dir);
    }
    if !dir.is_dir() || !is_removable_dir(dir) {
        return Ok(());
    }

    let kept: Vec<_> = keep.iter().filter_map(|p| p.file_name()).collect();
    let entries = std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    for entry in entries {
        let path = entry.with_context(|| format!("listing {}", dir.display()))?.path();
        if path.file_name().is_some_and(|name| kept.contains(&name)) {
            continue;
        }
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.with_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}

fn write_reports(
    config: &RunConfig,
    rows: &[ResultRow],
    summaries: &[ShapeSummary],
) -> anyhow::Result<Vec<PathBuf>> {
    let name = config.report_name();
    let base = format!("{}_{}", config.output_prefix.display(), name);
    let mut written = Vec::new();

    if config.report_format.includes_csv() {
        let path = PathBuf::from(format!("{}.csv", base));
        std::fs::write(&path, generate_csv_report(rows)?)
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    if config.report_format.includes_json() {
        let report = RunReport {
            version: env!("CARGO_PKG_VERSION"),
            collection: &name,
            timestamp: Utc::now(),
            results: rows,
            summary: summaries,
        };
        let path = PathBuf::from(format!("{}.json", base));
        std::fs::write(&path, generate_json_report(&report)?)
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}
