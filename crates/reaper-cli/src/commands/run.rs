//! Run command implementation.

use crate::cli::RunArgs;
use crate::commands::load_policies;
use crate::error::Result;
use crate::output::Formatter;
use reaper_domain::SystemClock;
use reaper_janitor::{JanitorConfig, JanitorWorker};
use reaper_store::{snapshot, MemoryStore};
use std::future::Future;
use tokio::sync::watch;

/// Execute the run command.
///
/// Loads the snapshot into an in-memory store and runs the janitor over it
/// until Ctrl+C.
pub async fn execute_run(args: RunArgs, formatter: &Formatter) -> Result<()> {
    let config = JanitorConfig::from_file(&args.config)?;
    let records = snapshot::load_records(&args.records)?;
    let policies = load_policies(args.policies.as_deref())?;

    let store = MemoryStore::with_records(records);
    let events = store.subscribe();
    println!(
        "{}",
        formatter.info(&format!("Watching {} record(s), press Ctrl+C to stop", store.len()))
    );

    let (shutdown_tx, shutdown) = watch::channel(false);
    tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), shutdown_tx));

    let worker = JanitorWorker::new(config, store.clone(), policies, SystemClock);
    worker.run(events, shutdown).await?;

    let metrics = worker.metrics();
    println!("{}", metrics.summary());
    println!(
        "{}",
        formatter.success(&format!(
            "Janitor stopped: {} deleted, {} record(s) remain",
            metrics.total_deleted(),
            store.len()
        ))
    );
    Ok(())
}

/// Request shutdown once `signal` fires
///
/// If the signal cannot be listened for, the sender is held open so the
/// janitor keeps running instead of stopping at once.
async fn forward_interrupt<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            let _ = shutdown.send(true);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C, stop the process to exit");
            std::future::pending::<()>().await;
        }
    }
}
