//! Configuration helpers shared across the API and worker binaries.
//!
//! The configuration layer centralises access to environment variables so
//! that both processes agree on a single data root and derive the same
//! directory layout from it, replacing the cyclic "routers wire a service,
//! the worker imports the same constants" wiring of the source project with
//! an explicit record passed down from each binary's `main`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_data_dir() -> String {
    "data".into()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_poll_interval_secs() -> u64 {
    2
}

#[derive(Debug, Clone, Deserialize)]
/// Top level configuration object constructed from environment variables.
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Settings {
    /// Loads settings from the process environment, falling back to defaults
    /// where individual values are not provided. Environment variables are
    /// read without a prefix, e.g. `DATA_DIR`, `BIND_ADDR`, `POLL_INTERVAL_SECS`.
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn paths(&self) -> Paths {
        Paths::new(&self.data_dir)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: default_data_dir(),
            bind_addr: default_bind_addr(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Directory layout rooted at a single data directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Paths { root: root.into() }
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join("incoming")
    }

    pub fn incoming_job_dir(&self, job_id: &str) -> PathBuf {
        self.incoming_dir().join(job_id)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn processed_job_dir(&self, job_id: &str) -> PathBuf {
        self.processed_dir().join(job_id)
    }

    pub fn approved_dir(&self) -> PathBuf {
        self.root.join("approved")
    }

    pub fn approved_job_dir(&self, date: &str, job_id: &str) -> PathBuf {
        self.approved_dir().join(date).join(job_id)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn jobs_file(&self) -> PathBuf {
        self.state_dir().join("jobs.json")
    }

    pub fn queue_file(&self) -> PathBuf {
        self.state_dir().join("queue.jsonl")
    }

    pub fn model_registry_file(&self) -> PathBuf {
        self.state_dir().join("model_registry.json")
    }

    pub fn master_dir(&self) -> PathBuf {
        self.root.join("master")
    }

    /// Ensures every top level directory in the layout exists.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [
            self.incoming_dir(),
            self.processed_dir(),
            self.approved_dir(),
            self.state_dir(),
            self.master_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Atomically rewrites `path` with `contents`: write to a sibling temp file
/// then rename over the target, so readers never observe a partial write.
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
