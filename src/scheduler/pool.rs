//! Pool mode: K workers draining a shared queue of child-process runs

use crate::report::{JobReport, ResultReporter};
use crate::scheduler::{JobOutcome, Outcome, RunSummary, WorkItem, WorkQueue};
use crate::state::ErrorRecord;
use crate::TallyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinSet;

/// Wall-clock budget for one work item
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a worker waits on an empty queue before it stops
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Runs one work item to completion
#[async_trait]
pub trait ItemRunner: Send + Sync {
    /// Returns true if the item succeeded
    async fn run_item(&self, item: &WorkItem) -> Result<bool, TallyError>;
}

/// Runs each item as a child process of `program`
///
/// The child is killed if the run is dropped, which is how the pool's timeout
/// abandons it.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

#[async_trait]
impl ItemRunner for ProcessRunner {
    async fn run_item(&self, item: &WorkItem) -> Result<bool, TallyError> {
        let mut child = Command::new(&self.program)
            .args(item.to_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TallyError::Spawn {
                job: item.job.clone(),
                source,
            })?;

        let status = child.wait().await?;
        tracing::debug!("{} exited: {}", item.job, status);
        Ok(status.success())
    }
}

/// Fixed-size pool of workers pulling from a `WorkQueue`
///
/// An item that times out, cannot be started, or fails without reporting is
/// reported here with an unknown total, so the stored result never goes stale.
#[derive(Clone)]
pub struct Pool {
    runner: Arc<dyn ItemRunner>,
    reporter: Arc<dyn ResultReporter>,
    workers: usize,
    item_timeout: Duration,
    poll_interval: Duration,
}

impl Pool {
    pub fn new(runner: Arc<dyn ItemRunner>, reporter: Arc<dyn ResultReporter>, workers: usize) -> Self {
        Self {
            runner,
            reporter,
            workers: workers.max(1),
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs every item once and returns when the queue is drained
    pub async fn run(&self, items: Vec<WorkItem>) -> RunSummary {
        tracing::info!(
            "Running {} work items on {} workers",
            items.len(),
            self.workers
        );

        let queue = Arc::new(WorkQueue::new(items));
        let mut workers = JoinSet::new();

        for index in 0..self.workers {
            let pool = self.clone();
            let queue = queue.clone();
            workers.spawn(async move { pool.work(index, &queue).await });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcomes) => summary.outcomes.extend(outcomes),
                Err(e) => tracing::error!("Pool worker aborted: {}", e),
            }
        }

        summary
    }

    async fn work(&self, index: usize, queue: &WorkQueue) -> Vec<JobOutcome> {
        let mut outcomes = Vec::new();

        while let Some(item) = queue.poll(self.poll_interval).await {
            tracing::info!("Worker {} starting {}", index, item.job);
            let started = Utc::now();

            let (outcome, unreported) =
                match tokio::time::timeout(self.item_timeout, self.runner.run_item(&item)).await {
                    Ok(Ok(true)) => (Outcome::Completed { total: None }, None),
                    Ok(Ok(false)) => (
                        Outcome::Failed {
                            reason: "worker exited with failure".to_string(),
                        },
                        Some(ErrorRecord::worker_crash(format!(
                            "Worker for {} exited with failure",
                            item.job
                        ))),
                    ),
                    Ok(Err(e)) => {
                        tracing::error!("Worker {} exception for {}: {}", index, item.job, e);
                        (
                            Outcome::Failed {
                                reason: e.to_string(),
                            },
                            Some(ErrorRecord::worker_crash(e.to_string())),
                        )
                    }
                    Err(_) => {
                        tracing::error!(
                            "Worker {} exception for {}: timed out after {:?}",
                            index,
                            item.job,
                            self.item_timeout
                        );
                        (
                            Outcome::TimedOut,
                            Some(ErrorRecord::timeout(format!(
                                "{} timed out after {:?}",
                                item.job, self.item_timeout
                            ))),
                        )
                    }
                };

            if let Some(error) = unreported {
                self.report_unfinished(&item, &started, error);
            }
            outcomes.push(JobOutcome::new(&item.job, outcome));
        }

        tracing::info!("Worker {} DONE", index);
        outcomes
    }

    /// Reports a failed item unless its child already reported it
    fn report_unfinished(&self, item: &WorkItem, started: &DateTime<Utc>, error: ErrorRecord) {
        match self.reporter.reported_since(&item.job, started) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => tracing::warn!("Cannot check stored result of {}: {}", item.job, e),
        }

        let report = JobReport::failed(&item.job, item.label(), error);
        if let Err(e) = self.reporter.report(&report) {
            tracing::error!("Failed to report {}: {}", item.job, e);
        }
    }
}
