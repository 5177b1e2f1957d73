//! Shared domain crate consumed by both the API and worker binaries:
//! configuration, persistence, the document pipeline stages, and the
//! process-local event bus and metrics singleton that both processes wire
//! into an explicit [`AppContext`] rather than importing global state.

pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod extractor;
pub mod fuzzy;
pub mod job_store;
pub mod layout;
pub mod master_registry;
pub mod metrics;
pub mod model_registry;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod queue;
pub mod segment;
pub mod validator;

use config::{Paths, Settings};
use error::Result;
use events::EventBus;
use job_store::JobStore;
use queue::FileQueue;

/// Bundles the process-wide collaborators a binary needs, built once at
/// startup and passed down explicitly instead of reached for through
/// globals.
pub struct AppContext {
    pub settings: Settings,
    pub paths: Paths,
    pub job_store: JobStore,
    pub queue: FileQueue,
    pub events: EventBus,
}

impl AppContext {
    pub fn build(settings: Settings) -> Result<Self> {
        let paths = settings.paths();
        paths.ensure()?;
        let job_store = JobStore::open(&paths)?;
        let queue = FileQueue::new(paths.queue_file());
        let events = EventBus::new();
        Ok(AppContext { settings, paths, job_store, queue, events })
    }

    pub fn process_job(&self, job_id: &str) -> Result<()> {
        pipeline::process_job(&self.paths, &self.job_store, job_id)
    }

    /// Approves a job and immediately runs the promoter, keeping the
    /// promoter's filesystem side effects out of the job store itself.
    pub fn approve_job(&self, job_id: &str, approver: &str, notes: Option<&str>) -> Result<models::Job> {
        let job = self.job_store.approve(job_id, approver, notes)?;
        approval::promote(&self.paths, &self.job_store, &self.events, &job)?;
        Ok(job)
    }
}
