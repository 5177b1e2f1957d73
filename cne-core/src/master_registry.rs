//! File-backed acronym catalogue: one JSON file per entry (or a bulk list)
//! under the master directory, plus the content-addressed version digest the
//! approval promoter stamps into `meta.json`. Grounded in
//! `original_source/api/app/services/master_data.py`.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Result;
use crate::models::{MasterDataResponse, MasterRecord};

fn json_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Loads every record under the master directory into a list plus a
/// case-insensitive lookup keyed by uppercased `sigla`.
pub fn load_all(dir: &Path) -> Result<(Vec<MasterRecord>, HashMap<String, MasterRecord>)> {
    let mut records: Vec<MasterRecord> = Vec::new();
    for file in json_files(dir)? {
        let contents = std::fs::read_to_string(&file)?;
        let value: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                warn!(file = %file.display(), %err, "failed to parse master data file");
                return Err(err.into());
            }
        };
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    records.push(serde_json::from_value(item)?);
                }
            }
            other => records.push(serde_json::from_value(other)?),
        }
    }
    let index = records.iter().cloned().map(|r| (r.sigla.to_uppercase(), r)).collect();
    Ok((records, index))
}

pub fn list(dir: &Path) -> Result<MasterDataResponse> {
    let (records, _) = load_all(dir)?;
    Ok(MasterDataResponse { records })
}

/// Writes one record to `<sigla_lowercase>.json`, overwriting any prior file.
pub fn upsert(dir: &Path, record: &MasterRecord) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", record.sigla.to_lowercase()));
    let contents = serde_json::to_string_pretty(record)?;
    crate::config::atomic_write(&path, contents.as_bytes())?;
    Ok(())
}

/// Content-addressed version of the master directory: SHA-256 over the
/// sorted `(name, bytes)` pairs of every regular `*.json` file; `"empty"` if
/// there are none.
pub fn master_data_version(dir: &Path) -> Result<String> {
    let files = json_files(dir)?;
    if files.is_empty() {
        return Ok("empty".to_string());
    }

    let mut hasher = Sha256::new();
    for file in files {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        hasher.update(name.as_bytes());
        let mut handle = std::fs::File::open(&file)?;
        let mut bytes = Vec::new();
        handle.read_to_end(&mut bytes)?;
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}
