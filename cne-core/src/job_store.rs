//! Durable job state store: a single JSON file mapping job id to job record,
//! mutated behind one mutex per store instance and rewritten atomically on
//! every change (write-new+rename, per the design notes on persistence).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::config::{atomic_write, Paths};
use crate::error::{AppError, Result};
use crate::metrics::Metrics;
use crate::models::{new_job_id, Job, JobStatus, JobSummary, QueueEntry};

pub struct JobStore {
    path: PathBuf,
    queue_path: PathBuf,
    state: Mutex<HashMap<String, Job>>,
}

impl JobStore {
    /// Loads the store from `paths.jobs_file()`, creating an empty one if it
    /// does not exist yet.
    pub fn open(paths: &Paths) -> Result<Self> {
        paths.ensure()?;
        let path = paths.jobs_file();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };
        Ok(JobStore {
            path,
            queue_path: paths.queue_file(),
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &HashMap<String, Job>) -> Result<()> {
        let body = serde_json::to_vec_pretty(state)?;
        atomic_write(&self.path, &body)?;
        Ok(())
    }

    pub fn create(&self, filename: &str, uploader: Option<&str>) -> Result<Job> {
        let now = Utc::now();
        let mut metadata = HashMap::new();
        metadata.insert(
            "uploader".to_string(),
            uploader.map(Value::from).unwrap_or(Value::Null),
        );
        let job = Job {
            job_id: new_job_id(),
            status: JobStatus::Received,
            filename: filename.to_string(),
            created_at: now,
            updated_at: now,
            approved_at: None,
            error: None,
            ocr_conf_mean: None,
            preview_ready: false,
            csv_ready: false,
            metadata,
        };
        let mut state = self.state.lock().unwrap();
        state.insert(job.job_id.clone(), job.clone());
        self.persist(&state)?;
        Metrics::global().increment("jobs.created", 1);
        info!(job_id = %job.job_id, status = %job.status, "job received");
        Ok(job)
    }

    pub fn list(&self) -> Vec<JobSummary> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<JobSummary> = state.values().map(JobSummary::from).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn get(&self, job_id: &str) -> Result<Job> {
        let state = self.state.lock().unwrap();
        state
            .get(job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
    }

    /// Atomically transitions `job_id` to `status`, shallow-merging
    /// `metadata` into the existing metadata map and overwriting any other
    /// field the caller passes via `updates`.
    pub fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        metadata: Option<HashMap<String, Value>>,
        updates: JobUpdates,
    ) -> Result<Job> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .get_mut(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        job.status = status;
        if let Some(meta) = metadata {
            if let Some(conf) = meta.get("ocr_conf_mean").and_then(Value::as_f64) {
                job.ocr_conf_mean = Some(conf);
            }
            job.metadata.extend(meta);
        }
        if let Some(error) = updates.error {
            job.error = error;
        }
        if let Some(approved_at) = updates.approved_at {
            job.approved_at = Some(approved_at);
        }
        if let Some(preview_ready) = updates.preview_ready {
            job.preview_ready = preview_ready;
        }
        if let Some(csv_ready) = updates.csv_ready {
            job.csv_ready = csv_ready;
        }
        job.updated_at = Utc::now();

        let snapshot = job.clone();
        self.persist(&state)?;
        info!(job_id = %job_id, status = %status, "job status transition");
        Ok(snapshot)
    }

    pub fn set_processing(&self, job_id: &str) -> Result<Job> {
        Metrics::global().increment("jobs.processing", 1);
        self.update_status(job_id, JobStatus::Processing, None, JobUpdates::default())
    }

    pub fn set_completed(&self, job_id: &str, ocr_conf_mean: f64) -> Result<Job> {
        let mut metadata = HashMap::new();
        metadata.insert("ocr_conf_mean".to_string(), Value::from(ocr_conf_mean));
        Metrics::global().increment("jobs.completed", 1);
        self.update_status(
            job_id,
            JobStatus::Completed,
            Some(metadata),
            JobUpdates {
                preview_ready: Some(true),
                csv_ready: Some(true),
                ..Default::default()
            },
        )
    }

    pub fn mark_failed(&self, job_id: &str, error: &str) -> Result<Job> {
        tracing::error!(job_id = %job_id, error, "job failed");
        self.update_status(
            job_id,
            JobStatus::Failed,
            None,
            JobUpdates {
                error: Some(Some(error.to_string())),
                ..Default::default()
            },
        )
    }

    /// Appends the job to the file queue then transitions it to `Queued`.
    pub fn enqueue(&self, job: &Job) -> Result<Job> {
        let entry = QueueEntry {
            job_id: job.job_id.clone(),
            filename: job.filename.clone(),
            received_at: job.created_at,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        if let Some(parent) = self.queue_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.queue_path)?;
        file.write_all(line.as_bytes())?;

        let updated = self.update_status(&job.job_id, JobStatus::Queued, None, JobUpdates::default())?;
        Metrics::global().increment("jobs.queued", 1);
        info!(job_id = %job.job_id, "job enqueued");
        Ok(updated)
    }

    /// Transitions the job to `Approved`, merging `approved_by`/`notes` into
    /// metadata. Does not invoke the approval promoter; callers (the HTTP
    /// facade) are expected to call [`crate::approval::promote`] afterwards,
    /// keeping the promoter's filesystem side effects out of the store.
    pub fn approve(&self, job_id: &str, approver: &str, notes: Option<&str>) -> Result<Job> {
        self.get(job_id)?;
        let mut metadata = HashMap::new();
        metadata.insert("approved_by".to_string(), Value::from(approver));
        metadata.insert(
            "notes".to_string(),
            notes.map(Value::from).unwrap_or(Value::Null),
        );
        let job = self.update_status(
            job_id,
            JobStatus::Approved,
            Some(metadata),
            JobUpdates {
                approved_at: Some(Utc::now()),
                ..Default::default()
            },
        )?;
        Metrics::global().increment("jobs.approved", 1);
        Ok(job)
    }
}

/// Optional per-field overrides applied by [`JobStore::update_status`],
/// beyond the status/metadata merge every transition performs.
#[derive(Default)]
pub struct JobUpdates {
    pub error: Option<Option<String>>,
    pub approved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub preview_ready: Option<bool>,
    pub csv_ready: Option<bool>,
}
