//! Jobs and their targets
//!
//! A `Job` is one logical crawl unit producing one aggregated count. It owns
//! its targets, its running total and the first error recorded against it.
//! Exactly one execution context mutates a job at a time: the cooperative
//! slot or the isolated worker running it.

mod lifecycle;

pub use lifecycle::{Finalize, Lifecycle, LogSummary};

use crate::config::JobEntry;
use crate::report::JobReport;
use crate::state::{ErrorRecord, JobState};
use crate::strategy::{ExtractionStrategy, PaginationStrategy, StrategyError};
use crate::TallyError;
use std::fmt;
use std::time::{Duration, Instant};

/// One start page with its bound strategy pair
pub struct Target {
    pub start_url: String,
    pub extraction: Box<dyn ExtractionStrategy>,
    pub pagination: Option<Box<dyn PaginationStrategy>>,
}

impl Target {
    /// A single-page target
    pub fn new(start_url: impl Into<String>, extraction: Box<dyn ExtractionStrategy>) -> Self {
        Self {
            start_url: start_url.into(),
            extraction,
            pagination: None,
        }
    }

    /// Binds a pagination strategy to this target
    pub fn with_pagination(mut self, pagination: Box<dyn PaginationStrategy>) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("start_url", &self.start_url)
            .field("paginated", &self.pagination.is_some())
            .finish()
    }
}

/// One crawl job
#[derive(Debug)]
pub struct Job {
    name: String,
    label: String,
    targets: Vec<Target>,
    total: u64,
    error: Option<ErrorRecord>,
    state: JobState,
    started_at: Option<Instant>,
}

impl Job {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            targets: Vec::new(),
            total: 0,
            error: None,
            state: JobState::Pending,
            started_at: None,
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Builds a job from its configuration entry
    ///
    /// Every call builds fresh strategy instances, so nothing carries over
    /// between attempts of the same job.
    pub fn from_entry(entry: &JobEntry) -> Result<Self, StrategyError> {
        let mut job = Self::new(&entry.name, entry.label());

        for target_entry in &entry.targets {
            let mut target = Target::new(&target_entry.url, target_entry.extraction.build()?);
            if let Some(rule) = &target_entry.pagination {
                target = target.with_pagination(rule.build()?);
            }
            job.targets.push(target);
        }

        Ok(job)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    /// Hands the targets to the engine. A job's targets are walked once.
    pub(crate) fn take_targets(&mut self) -> Vec<Target> {
        std::mem::take(&mut self.targets)
    }

    /// Adds one page's count to the running total
    pub fn add_count(&mut self, count: u64) {
        self.total = self.total.saturating_add(count);
    }

    /// Records an error against the job
    ///
    /// Only the first error is kept. Returns true if `error` was the first.
    pub fn record_error(&mut self, error: ErrorRecord) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(error);
        true
    }

    /// The total, or `None` once any error has been recorded
    pub fn total(&self) -> Option<u64> {
        match self.error {
            Some(_) => None,
            None => Some(self.total),
        }
    }

    /// Moves the job to `to`, rejecting transitions the lifecycle forbids
    pub fn transition(&mut self, to: JobState) -> Result<(), TallyError> {
        if !self.state.can_transition_to(to) {
            return Err(TallyError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        if to == JobState::Running {
            self.started_at = Some(Instant::now());
        }
        self.state = to;
        Ok(())
    }

    /// Time spent since the job started running
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// The job's result as handed to a reporter
    pub fn report(&self) -> JobReport {
        JobReport::new(&self.name, &self.label, self.total, self.error.clone())
    }
}
