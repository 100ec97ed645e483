//! Job lifecycle: open, run, close

use crate::channel::ErrorSender;
use crate::engine::Engine;
use crate::job::Job;
use crate::report::{JobReport, ResultReporter};
use crate::state::{ErrorOrigin, ErrorRecord, JobState};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Summary hook run first thing in `close`
pub trait Finalize: Send + Sync {
    fn finalize(&self, job: &Job) {
        match job.total() {
            Some(total) => tracing::info!("{} items: \"{}\"", total, job.label()),
            None => tracing::info!("N/A items: \"{}\"", job.label()),
        }
    }
}

/// The default finalizer: a one-line summary in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSummary;

impl Finalize for LogSummary {}

/// Owns a job's state transitions and its final reporting
#[derive(Clone)]
pub struct Lifecycle {
    engine: Engine,
    reporter: Arc<dyn ResultReporter>,
    finalizer: Arc<dyn Finalize>,
}

impl Lifecycle {
    pub fn new(engine: Engine, reporter: Arc<dyn ResultReporter>) -> Self {
        Self {
            engine,
            reporter,
            finalizer: Arc::new(LogSummary),
        }
    }

    pub fn with_finalizer(mut self, finalizer: Arc<dyn Finalize>) -> Self {
        self.finalizer = finalizer;
        self
    }

    /// Starts the job: `Pending -> Running`
    pub fn open(&self, job: &mut Job) -> crate::Result<()> {
        job.transition(JobState::Running)?;
        tracing::info!("Starting {}", job.name());
        Ok(())
    }

    /// Reports the job and settles its terminal state
    ///
    /// Runs the finalize hook, hands the report to the reporter, then logs the
    /// elapsed time. The state is settled after reporting, so a job whose
    /// result could not be stored ends `Failed` with an unknown total. Called
    /// exactly once per job, whether or not the run succeeded.
    pub async fn close(&self, job: &mut Job, errors: &ErrorSender) -> JobReport {
        self.finalizer.finalize(job);

        let mut report = job.report();
        if let Err(e) = self.reporter.report(&report) {
            let error = ErrorRecord::new(
                ErrorOrigin::Reporting,
                format!("Failed to report {}: {}", job.name(), e),
            );
            tracing::error!("{}", error);
            if job.record_error(error.clone()) {
                report = job.report();
            }
            errors.push(error).await;
        }

        let terminal = if job.error().is_some() {
            JobState::Failed
        } else {
            JobState::Completed
        };
        if let Err(e) = job.transition(terminal) {
            tracing::warn!("Closing {}: {}", job.name(), e);
        }

        tracing::info!(
            "Finished {}. Execution took: {:.2}s",
            job.name(),
            job.elapsed().as_secs_f64()
        );

        report
    }

    /// Runs a job from open to close
    ///
    /// A panic inside the engine is caught, recorded as the job's error and
    /// pushed to the error channel, and `close` still runs.
    pub async fn run(&self, job: &mut Job, errors: &ErrorSender) -> JobReport {
        match self.open(job) {
            Ok(()) => {
                let run = AssertUnwindSafe(self.engine.run(job, errors))
                    .catch_unwind()
                    .await;
                if let Err(panic) = run {
                    let error = ErrorRecord::worker_crash(format!(
                        "Engine panicked: {}",
                        panic_message(panic.as_ref())
                    ));
                    tracing::error!("{}: {}", job.name(), error);
                    job.record_error(error.clone());
                    errors.push(error).await;
                }
            }
            Err(e) => tracing::error!("Cannot start {}: {}", job.name(), e),
        }

        self.close(job, errors).await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
