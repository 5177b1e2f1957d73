//! Append-only, file-backed model version history: register a candidate
//! after every approval, then promote/rollback/update its metrics. Grounded
//! in `original_source/ml/registry.py`, with `promote`/`rollback` carried
//! over from that file even though the distilled pipeline only exercises
//! `register` directly.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::config::atomic_write;
use crate::error::Result;
use crate::models::{ModelHistoryResponse, ModelRecord, ModelStatus};

fn load_history(path: &Path) -> Result<Vec<ModelRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

fn save_history(path: &Path, history: &[ModelRecord]) -> Result<()> {
    let contents = serde_json::to_string_pretty(history)?;
    atomic_write(path, contents.as_bytes())?;
    Ok(())
}

/// Appends a new candidate record, versioned as a zero-padded running
/// sequence number (`"001"`, `"002"`, ...).
pub fn register(path: &Path, model_name: &str, metrics: HashMap<String, Value>) -> Result<ModelRecord> {
    let mut history = load_history(path)?;
    let version = format!("{:03}", history.len() + 1);
    let record = ModelRecord {
        model_name: model_name.to_string(),
        version,
        created_at: chrono::Utc::now(),
        status: ModelStatus::Candidate,
        metrics,
    };
    history.push(record.clone());
    save_history(path, &history)?;
    Ok(record)
}

/// Promotes `version` to production, archiving every other record.
pub fn promote(path: &Path, version: &str) -> Result<()> {
    let mut history = load_history(path)?;
    for record in &mut history {
        record.status = if record.version == version { ModelStatus::Production } else { ModelStatus::Archived };
    }
    save_history(path, &history)
}

/// Makes `version` production again, archiving whichever record currently
/// holds that status.
pub fn rollback(path: &Path, version: &str) -> Result<()> {
    let mut history = load_history(path)?;
    for record in &mut history {
        if record.version == version {
            record.status = ModelStatus::Production;
        } else if record.status == ModelStatus::Production {
            record.status = ModelStatus::Archived;
        }
    }
    save_history(path, &history)
}

pub fn update_metrics(path: &Path, version: &str, metrics: HashMap<String, Value>) -> Result<()> {
    let mut history = load_history(path)?;
    for record in &mut history {
        if record.version == version {
            record.metrics.extend(metrics.clone());
        }
    }
    save_history(path, &history)
}

pub fn history(path: &Path) -> Result<ModelHistoryResponse> {
    Ok(ModelHistoryResponse { items: load_history(path)? })
}
