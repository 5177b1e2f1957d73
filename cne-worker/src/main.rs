//! Single-threaded worker binary: polls the file queue on an interval,
//! draining and running the pipeline for each popped job in order. Grounded
//! in `original_source/worker/src/worker.py`'s `run_forever` loop.

use std::thread::sleep;
use std::time::Duration;

use cne_core::config::Settings;
use cne_core::AppContext;
use tracing::{error, info};

fn run_forever(context: &AppContext, poll_interval: Duration) -> ! {
    info!("worker started");
    loop {
        match context.queue.drain() {
            Ok(entries) if entries.is_empty() => sleep(poll_interval),
            Ok(entries) => {
                for entry in entries {
                    info!(job_id = %entry.job_id, "worker picked job");
                    if let Err(err) = context.process_job(&entry.job_id) {
                        error!(job_id = %entry.job_id, error = %err, "pipeline run failed");
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "queue drain failed");
                sleep(poll_interval);
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt().json().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let settings = Settings::new().unwrap_or_default();
    let poll_interval = Duration::from_secs(settings.poll_interval_secs);
    let context = AppContext::build(settings).expect("failed to build application context");

    run_forever(&context, poll_interval);
}
