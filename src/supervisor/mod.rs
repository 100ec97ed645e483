//! Isolated retry supervisor
//!
//! A job attempt runs in a freshly spawned worker process. The worker streams
//! its error channel back over stdout and always ends with one sentinel. The
//! supervisor reads until the sentinel, waits for the process to exit, and
//! decides whether to try again. Every retry gets a brand-new process, so no
//! state from a failed attempt survives into the next one.
//!
//! Workers report into memory only. The report captured by the last attempt
//! travels on the sentinel and is handed to the real reporter here, once.

mod worker;

pub use worker::{serve_attempt, ProcessLauncher, ProcessWorker};

use crate::channel::Signal;
use crate::config::JobEntry;
use crate::report::{JobReport, ResultReporter};
use crate::state::ErrorRecord;
use crate::TallyError;
use async_trait::async_trait;
use std::sync::Arc;

/// How an isolated worker exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub success: bool,
    pub code: Option<i32>,
}

/// A running isolated worker
#[async_trait]
pub trait IsolatedWorker: Send {
    /// The next signal on the worker's error channel, `None` at end of stream
    async fn next_signal(&mut self) -> Option<Signal>;

    /// Waits for the worker to terminate
    async fn join(self: Box<Self>) -> Result<WorkerExit, TallyError>;
}

/// Starts isolated workers, one per attempt
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, job: &str, attempt: u32) -> Result<Box<dyn IsolatedWorker>, TallyError>;
}

/// Result of a supervised job that ended `Completed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supervised {
    pub report: JobReport,

    /// Number of workers launched, including the successful one
    pub attempts: u32,
}

/// What one attempt produced
#[derive(Debug, Default)]
struct Attempt {
    errors: Vec<ErrorRecord>,
    report: Option<JobReport>,
}

/// Runs jobs in isolated workers with retry-on-failure
#[derive(Clone)]
pub struct Supervisor {
    launcher: Arc<dyn WorkerLauncher>,
    reporter: Arc<dyn ResultReporter>,
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, reporter: Arc<dyn ResultReporter>) -> Self {
        Self { launcher, reporter }
    }

    /// Runs a configured job with a budget of `trials` attempts
    pub async fn run_entry(&self, entry: &JobEntry, trials: u32) -> crate::Result<Supervised> {
        self.run_with_retry(&entry.name, entry.label(), trials).await
    }

    /// Runs a job with a budget of `trials` attempts (at least one)
    ///
    /// # Returns
    ///
    /// * `Ok(Supervised)` - An attempt finished without errors
    /// * `Err(TallyError::JobFailed)` - Every attempt failed; carries the
    ///   first error of the last attempt
    pub async fn run_with_retry(
        &self,
        name: &str,
        label: &str,
        trials: u32,
    ) -> crate::Result<Supervised> {
        let mut remaining = trials.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let attempt = self.attempt(name, attempts).await;

            let first = match attempt.errors.first() {
                None => {
                    if let Some(report) = attempt.report {
                        self.deliver(&report);
                        return Ok(Supervised { report, attempts });
                    }
                    ErrorRecord::worker_crash(format!("Worker for {} finished without a report", name))
                }
                Some(error) => error.clone(),
            };

            tracing::warn!("{} attempt {} failed: {}", name, attempts, first);
            remaining -= 1;

            if remaining > 0 {
                tracing::info!("Retrying. Remaining trials = {}", remaining);
                continue;
            }

            let report = match attempt.report {
                Some(report) if report.error.is_some() => report,
                _ => JobReport::failed(name, label, first.clone()),
            };
            self.deliver(&report);

            return Err(TallyError::JobFailed {
                job: name.to_string(),
                error: first,
            });
        }
    }

    async fn attempt(&self, name: &str, number: u32) -> Attempt {
        let mut worker = match self.launcher.launch(name, number).await {
            Ok(worker) => worker,
            Err(e) => {
                return Attempt {
                    errors: vec![ErrorRecord::worker_crash(e.to_string())],
                    report: None,
                }
            }
        };

        let mut attempt = Attempt::default();
        let mut finished = false;

        while let Some(signal) = worker.next_signal().await {
            match signal {
                Signal::Error { error } => attempt.errors.push(error),
                Signal::Finished { report } => {
                    attempt.report = report;
                    finished = true;
                    break;
                }
            }
        }

        let exit = worker.join().await;

        if !finished {
            attempt.errors.push(ErrorRecord::worker_crash(format!(
                "Worker for {} exited before finishing",
                name
            )));
        }

        match exit {
            Ok(exit) if !exit.success && attempt.errors.is_empty() => {
                attempt.errors.push(ErrorRecord::worker_crash(format!(
                    "Worker for {} exited with code {:?}",
                    name, exit.code
                )));
            }
            Err(e) if attempt.errors.is_empty() => {
                attempt.errors.push(ErrorRecord::worker_crash(e.to_string()));
            }
            _ => {}
        }

        if attempt.errors.is_empty() {
            if let Some(error) = attempt.report.as_ref().and_then(|r| r.error.clone()) {
                attempt.errors.push(error);
            }
        }

        attempt
    }

    fn deliver(&self, report: &JobReport) {
        if let Err(e) = self.reporter.report(report) {
            tracing::error!("Failed to report {}: {}", report.name, e);
        }
    }
}
