//! Approval promotion: copies processed artifacts into the date-partitioned
//! approved tree, registers a candidate model record, stamps the master-data
//! digest, and emits `result.approved`. Grounded in the filesystem-copy and
//! CSV-counting steps spelled out for the approval step, since no single
//! `original_source/` file owns this workflow end to end.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::config::{atomic_write, Paths};
use crate::error::Result;
use crate::events::EventBus;
use crate::job_store::JobStore;
use crate::master_registry::master_data_version;
use crate::model_registry;
use crate::models::{ApprovalArtifacts, ApprovalEvent, ApprovalMeta, ApprovalVersions, Job, ModelVersionRef};

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn count_csv_rows(path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().filter(|line| !line.trim().is_empty()).count().saturating_sub(1))
}

fn sorted_file_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Runs the full promotion workflow for an already-approved job and emits
/// `result.approved`. Missing processed artifacts are logged and skipped,
/// not treated as fatal, matching the job store's approve contract.
pub fn promote(
    paths: &Paths,
    job_store: &JobStore,
    events: &EventBus,
    job: &Job,
) -> Result<()> {
    let approved_at = match job.approved_at {
        Some(ts) => ts,
        None => return Ok(()),
    };
    let approved_date = approved_at.format("%Y-%m-%d").to_string();
    let processed_dir = paths.processed_job_dir(&job.job_id);
    let csv_src = processed_dir.join("output.csv");
    if !csv_src.exists() {
        warn!(job_id = %job.job_id, "no processed csv to promote, skipping");
        return Ok(());
    }

    let approved_dir = paths.approved_job_dir(&approved_date, &job.job_id);
    std::fs::create_dir_all(&approved_dir)?;

    let csv_dst = approved_dir.join("output.csv");
    std::fs::copy(&csv_src, &csv_dst)?;

    let preview_src = processed_dir.join("preview.json");
    let preview = if preview_src.exists() {
        let dst = approved_dir.join("preview.json");
        std::fs::copy(&preview_src, &dst)?;
        Some("preview.json".to_string())
    } else {
        None
    };

    let incoming_src = paths.incoming_job_dir(&job.job_id);
    let incoming_dst = approved_dir.join("incoming");
    if incoming_src.exists() {
        copy_dir_recursive(&incoming_src, &incoming_dst)?;
    }
    let incoming_names = sorted_file_names(&incoming_dst)?;

    let rows = count_csv_rows(&csv_dst)?;
    let mut metrics: HashMap<String, Value> = HashMap::new();
    metrics.insert("rows".to_string(), Value::from(rows));
    metrics.insert("job_id".to_string(), Value::from(job.job_id.clone()));
    let model_name = format!("dataset-{}", job.job_id);
    let model_record = model_registry::register(&paths.model_registry_file(), &model_name, metrics)?;

    let master_data = master_data_version(&paths.master_dir())?;

    let snapshot = job_store.get(&job.job_id)?;
    let meta = ApprovalMeta {
        job: snapshot,
        artifacts: ApprovalArtifacts {
            csv: "output.csv".to_string(),
            preview,
            incoming: incoming_names,
        },
        versions: ApprovalVersions {
            model: ModelVersionRef {
                name: model_record.model_name.clone(),
                version: model_record.version.clone(),
                status: model_record.status,
            },
            master_data,
        },
    };

    let meta_path = approved_dir.join("meta.json");
    let meta_json = serde_json::to_string_pretty(&meta)?;
    atomic_write(&meta_path, meta_json.as_bytes())?;

    let path = approved_dir.to_string_lossy().to_string();
    events.emit("result.approved", &ApprovalEvent { meta, path });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::models::CANONICAL_COLUMNS;
    use std::sync::{Arc, Mutex};

    fn write_processed_artifacts(paths: &Paths, job_id: &str) {
        let dir = paths.processed_job_dir(job_id);
        std::fs::create_dir_all(&dir).unwrap();
        let header = CANONICAL_COLUMNS.join(";");
        std::fs::write(dir.join("output.csv"), format!("{header}\nA;B;C;D;E;F;1;G;H;N\n")).unwrap();
        std::fs::write(dir.join("preview.json"), "{}").unwrap();
    }

    #[test]
    fn promote_copies_artifacts_and_writes_meta() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let job_store = JobStore::open(&paths).unwrap();
        let events = EventBus::new();

        let created = job_store.create("f.txt", None).unwrap();
        write_processed_artifacts(&paths, &created.job_id);
        let approved = job_store.approve(&created.job_id, "admin", Some("ok")).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        events.subscribe("result.approved", move |event| {
            seen_clone.lock().unwrap().push(event.clone());
        });

        promote(&paths, &job_store, &events, &approved).unwrap();

        let approved_date = approved.approved_at.unwrap().format("%Y-%m-%d").to_string();
        let approved_dir = paths.approved_job_dir(&approved_date, &created.job_id);
        assert!(approved_dir.join("output.csv").exists());
        assert!(approved_dir.join("meta.json").exists());

        let history = model_registry::history(&paths.model_registry_file()).unwrap();
        assert_eq!(history.items.len(), 1);
        assert_eq!(history.items[0].model_name, format!("dataset-{}", created.job_id));
        assert_eq!(history.items[0].metrics.get("rows").and_then(Value::as_i64), Some(1));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn promote_is_a_no_op_without_processed_csv() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let job_store = JobStore::open(&paths).unwrap();
        let events = EventBus::new();

        let created = job_store.create("f.txt", None).unwrap();
        let approved = job_store.approve(&created.job_id, "admin", None).unwrap();
        promote(&paths, &job_store, &events, &approved).unwrap();

        let approved_date = approved.approved_at.unwrap().format("%Y-%m-%d").to_string();
        let approved_dir = paths.approved_job_dir(&approved_date, &created.job_id);
        assert!(!approved_dir.exists());
    }

    #[test]
    fn promote_is_re_entrant_on_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let job_store = JobStore::open(&paths).unwrap();
        let events = EventBus::new();

        let created = job_store.create("f.txt", None).unwrap();
        write_processed_artifacts(&paths, &created.job_id);
        let approved = job_store.approve(&created.job_id, "admin", None).unwrap();

        promote(&paths, &job_store, &events, &approved).unwrap();
        promote(&paths, &job_store, &events, &approved).unwrap();

        let history = model_registry::history(&paths.model_registry_file()).unwrap();
        assert_eq!(history.items.len(), 2);
    }
}
