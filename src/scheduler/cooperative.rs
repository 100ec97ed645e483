//! Cooperative mode: all jobs share the current task

use crate::channel::error_channel;
use crate::job::{Job, Lifecycle};
use crate::scheduler::{JobOutcome, RunSummary};
use futures_util::future::join_all;

/// Runs every job concurrently on the current task until all have closed
///
/// Jobs yield to each other at every page fetch. Each job gets its own error
/// channel, drained alongside the run so a full channel never blocks it.
pub async fn run_cooperative(jobs: Vec<Job>, lifecycle: &Lifecycle) -> RunSummary {
    tracing::info!("Running {} jobs cooperatively", jobs.len());

    let runs = jobs.into_iter().map(|mut job| async move {
        let (tx, mut rx) = error_channel();

        let run = async move {
            let report = lifecycle.run(&mut job, &tx).await;
            tx.finish(None).await;
            report
        };

        let (report, drained) = tokio::join!(run, rx.drain());
        JobOutcome::from_report(&report, &drained.errors)
    });

    RunSummary {
        outcomes: join_all(runs).await,
    }
}
