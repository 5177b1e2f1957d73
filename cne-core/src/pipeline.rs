//! Per-job orchestration: OCR, layout, segmentation, extraction,
//! normalization, validation, and the CSV/preview writes that follow,
//! tying together every stage module behind one `process_job` entry point.
//! Grounded in `original_source/worker/src/pipeline.py` and `worker.py`'s
//! call sequence.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{error, info};

use crate::config::{atomic_write, Paths};
use crate::error::{AppError, Result};
use crate::extractor::extract_records;
use crate::job_store::JobStore;
use crate::layout::detect_layout;
use crate::master_registry::load_all;
use crate::metrics::Metrics;
use crate::models::{CanonicalRecord, CANONICAL_COLUMNS, PreviewResponse, PreviewRow};
use crate::normalize::normalize;
use crate::ocr::run_ocr;
use crate::segment::{reorder, segment};
use crate::validator::{validate, ValidationContext};

fn first_regular_file(dir: &Path) -> Option<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| path.is_file())
}

fn write_csv(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    let mut body = String::new();
    body.push_str(&CANONICAL_COLUMNS.join(";"));
    body.push('\n');
    for record in records {
        body.push_str(&record.as_columns().join(";"));
        body.push('\n');
    }
    atomic_write(path, body.as_bytes())?;
    Ok(())
}

fn write_preview(path: &Path, response: &PreviewResponse) -> Result<()> {
    let body = serde_json::to_string_pretty(response)?;
    atomic_write(path, body.as_bytes())?;
    Ok(())
}

/// Runs the full pipeline for `job_id`, transitioning the job through
/// PROCESSING and, on success, COMPLETED. Any unexpected error marks the job
/// FAILED, increments `worker.jobs.failed`, and is re-raised to the caller.
pub fn process_job(paths: &Paths, job_store: &JobStore, job_id: &str) -> Result<()> {
    job_store.set_processing(job_id)?;
    info!(job_id, "processing started");

    match run(paths, job_id) {
        Ok(ocr_conf_mean) => {
            job_store.set_completed(job_id, ocr_conf_mean)?;
            Metrics::global().increment("worker.jobs.completed", 1);
            info!(job_id, ocr_conf_mean, "processing completed");
            Ok(())
        }
        Err(err) => {
            job_store.mark_failed(job_id, &err.to_string())?;
            Metrics::global().increment("worker.jobs.failed", 1);
            error!(job_id, error = %err, "processing failed");
            Err(err)
        }
    }
}

fn run(paths: &Paths, job_id: &str) -> Result<f64> {
    let incoming_dir = paths.incoming_job_dir(job_id);
    let source = first_regular_file(&incoming_dir)
        .ok_or_else(|| AppError::NotFound(format!("no input file for job {job_id}")))?;

    let lines = run_ocr(&source)?;
    let ocr_conf_mean = if lines.is_empty() {
        0.0
    } else {
        lines.iter().map(|l| l.confidence).sum::<f64>() / lines.len() as f64
    };

    let layout = detect_layout(&lines);
    let ordered = reorder(segment(layout));
    let raw_records = extract_records(ordered);

    let (_, master) = load_all(&paths.master_dir())?;
    let canonical = normalize(&raw_records, &master);

    let context = ValidationContext { raw_records: &raw_records, ocr_conf_mean };
    let badges = validate(&canonical, &master, &context);

    let processed_dir = paths.processed_job_dir(job_id);
    std::fs::create_dir_all(&processed_dir)?;
    write_csv(&processed_dir.join("output.csv"), &canonical)?;

    let rows: Vec<PreviewRow> = canonical
        .iter()
        .zip(badges.into_iter())
        .map(|(record, validations)| PreviewRow {
            columns: record.as_columns().iter().map(|s| s.to_string()).collect(),
            validations,
        })
        .collect();
    let mut metadata: HashMap<String, Value> = HashMap::new();
    metadata.insert("ocr_conf_mean".to_string(), Value::from(ocr_conf_mean));
    let preview = PreviewResponse {
        job_id: job_id.to_string(),
        headers: CANONICAL_COLUMNS.iter().map(|s| s.to_string()).collect(),
        total_rows: rows.len(),
        rows,
        metadata,
    };
    write_preview(&processed_dir.join("preview.json"), &preview)?;

    Ok(ocr_conf_mean)
}
