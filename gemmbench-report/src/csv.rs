//! CSV Report Generation
//!
//! Spreadsheet-friendly view of a run's result rows. Raw tool output and
//! device property dumps are left to the JSON report.

use gemmbench_core::{format_scalar, ResultRow};

/// CSV columns, in output order
pub const CSV_COLUMNS: &str = "id,backend,type,order,transA,transB,m,n,k,alpha,beta,lda,ldb,ldc,gpu_id,commit_id,commit_branch,target_name,target_rt,compilable,executable,correct,kernel,time_ms,TFlops";

/// Generate a CSV report from result rows
///
/// # Returns
/// CSV-formatted string with a header row and one data row per result
pub fn generate_csv_report(rows: &[ResultRow]) -> Result<String, ::csv::Error> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS.split(','))?;

    for row in rows {
        let correct = match row.correct {
            Some(true) => "true",
            Some(false) => "false",
            None => "",
        };

        writer.write_record([
            row.id.clone(),
            row.backend.clone(),
            row.opts.data_type.to_string(),
            row.opts.order.code().to_string(),
            u8::from(row.opts.trans_a).to_string(),
            u8::from(row.opts.trans_b).to_string(),
            row.opts.m.to_string(),
            row.opts.n.to_string(),
            row.opts.k.to_string(),
            format_scalar(row.opts.alpha),
            format_scalar(row.opts.beta),
            row.opts.lda.to_string(),
            row.opts.ldb.to_string(),
            row.opts.ldc.to_string(),
            row.gpu_id.to_string(),
            row.commit_id.clone(),
            row.commit_branch.clone(),
            row.target_name.clone(),
            row.target_rt.to_string(),
            row.compilable.to_string(),
            row.executable.to_string(),
            correct.to_string(),
            row.kernel.clone().unwrap_or_default(),
            format!("{:.6}", row.time_ms),
            format!("{:.6}", row.tflops),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ::csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
