//! Job scheduling
//!
//! Three ways to run the selected jobs:
//! - cooperative: every job runs as a future on the current task, no isolation
//! - supervised: jobs run one after another, each through the retry supervisor
//! - pool: K workers drain a queue of work items, each run as a child process
//!
//! Each mode returns a `RunSummary` with one outcome per job or work item.

mod cooperative;
mod pool;
mod queue;

pub use cooperative::run_cooperative;
pub use pool::{ItemRunner, Pool, ProcessRunner, DEFAULT_ITEM_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use queue::{WorkItem, WorkQueue};

use crate::config::JobEntry;
use crate::report::JobReport;
use crate::state::ErrorRecord;
use crate::supervisor::Supervisor;
use crate::TallyError;
use std::fmt;

/// How one job or work item ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Finished without errors. Pool items do not know their total.
    Completed { total: Option<u64> },

    /// Finished with an error, after any retries
    Failed { reason: String },

    /// Killed by the pool's wall-clock timeout
    TimedOut,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { total: Some(total) } => write!(f, "completed ({} items)", total),
            Self::Completed { total: None } => write!(f, "completed"),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: String,
    pub outcome: Outcome,
}

impl JobOutcome {
    pub fn new(job: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            job: job.into(),
            outcome,
        }
    }

    /// Settles a job from its report and the errors seen on its channel
    pub fn from_report(report: &JobReport, errors: &[ErrorRecord]) -> Self {
        let outcome = match report.error.as_ref().or_else(|| errors.first()) {
            Some(error) => Outcome::Failed {
                reason: error.to_string(),
            },
            None => Outcome::Completed {
                total: report.total,
            },
        };
        Self::new(&report.name, outcome)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Completed { .. })
    }
}

/// Outcomes of one scheduler invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn push(&mut self, outcome: JobOutcome) {
        self.outcomes.push(outcome);
    }

    /// Names of the jobs that did not complete
    pub fn failed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.job.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::is_success)
    }

    /// Logs one line per outcome and a closing count
    pub fn log(&self) {
        for outcome in &self.outcomes {
            if outcome.is_success() {
                tracing::info!("{}: {}", outcome.job, outcome.outcome);
            } else {
                tracing::error!("{}: {}", outcome.job, outcome.outcome);
            }
        }
        tracing::info!(
            "{} of {} jobs completed",
            self.outcomes.len() - self.failed().len(),
            self.outcomes.len()
        );
    }

    /// Turns failures into `TallyError::JobsFailed`
    pub fn into_result(self) -> crate::Result<()> {
        let failed = self.failed();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(TallyError::JobsFailed(failed))
        }
    }
}

/// Runs jobs one after another, each under the retry supervisor
///
/// A job that fails after all trials does not stop the ones after it.
pub async fn run_supervised(
    entries: &[&JobEntry],
    supervisor: &Supervisor,
    trials: u32,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for entry in entries {
        let outcome = match supervisor.run_entry(entry, trials).await {
            Ok(supervised) => Outcome::Completed {
                total: supervised.report.total,
            },
            Err(TallyError::JobFailed { error, .. }) => Outcome::Failed {
                reason: error.to_string(),
            },
            Err(e) => Outcome::Failed {
                reason: e.to_string(),
            },
        };
        summary.push(JobOutcome::new(&entry.name, outcome));
    }

    summary
}
