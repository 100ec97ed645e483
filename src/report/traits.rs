//! Reporter trait and report types

use crate::state::ErrorRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur while reporting results
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Reporter lock poisoned")]
    Poisoned,
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// The final result of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// The job name
    pub name: String,

    /// Name of the counted entity
    pub label: String,

    /// The counted total, unknown whenever an error was recorded
    pub total: Option<u64>,

    /// The error that invalidated the total, if any
    pub error: Option<ErrorRecord>,

    /// When the job reached its terminal state
    pub timestamp: DateTime<Utc>,
}

impl JobReport {
    /// Builds a report, forcing the total to unknown when an error is present
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        total: u64,
        error: Option<ErrorRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            total: if error.is_some() { None } else { Some(total) },
            error,
            timestamp: Utc::now(),
        }
    }

    /// Builds the report of a job that failed without producing one itself
    pub fn failed(name: impl Into<String>, label: impl Into<String>, error: ErrorRecord) -> Self {
        Self::new(name, label, 0, Some(error))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The total as printed in logs and summaries
    pub fn total_display(&self) -> String {
        match self.total {
            Some(total) => total.to_string(),
            None => "N/A".to_string(),
        }
    }
}

/// Trait for result reporters
///
/// Implementations must be thread-safe; a reporter is shared by every job of
/// a cooperative run.
pub trait ResultReporter: Send + Sync {
    /// Persists the final result of one job
    fn report(&self, report: &JobReport) -> ReportResult<()>;

    /// Whether a report for `job` was persisted at or after `since`
    ///
    /// Lets a parent process tell whether a child reported before it died.
    /// Reporters that keep nothing readable answer `false`.
    fn reported_since(&self, _job: &str, _since: &DateTime<Utc>) -> ReportResult<bool> {
        Ok(false)
    }
}

/// Keeps reports in memory
///
/// Isolated workers report here and forward the captured report to their
/// supervisor on the error channel.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<JobReport>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far, oldest first
    pub fn reports(&self) -> Vec<JobReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    /// Removes and returns the most recent report
    pub fn take_last(&self) -> Option<JobReport> {
        self.reports.lock().ok().and_then(|mut reports| reports.pop())
    }
}

impl ResultReporter for MemoryReporter {
    fn report(&self, report: &JobReport) -> ReportResult<()> {
        let mut reports = self.reports.lock().map_err(|_| ReportError::Poisoned)?;
        reports.push(report.clone());
        Ok(())
    }

    fn reported_since(&self, job: &str, since: &DateTime<Utc>) -> ReportResult<bool> {
        let reports = self.reports.lock().map_err(|_| ReportError::Poisoned)?;
        Ok(reports
            .iter()
            .any(|report| report.name == job && report.timestamp >= *since))
    }
}

/// Hands each report to several reporters in turn
///
/// Every reporter is tried; the first failure is returned.
#[derive(Default, Clone)]
pub struct MultiReporter {
    reporters: Vec<Arc<dyn ResultReporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn ResultReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl ResultReporter for MultiReporter {
    fn report(&self, report: &JobReport) -> ReportResult<()> {
        let mut first_error = None;
        for reporter in &self.reporters {
            if let Err(e) = reporter.report(report) {
                tracing::error!("Reporter failed for {}: {}", report.name, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn reported_since(&self, job: &str, since: &DateTime<Utc>) -> ReportResult<bool> {
        for reporter in &self.reporters {
            if reporter.reported_since(job, since)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
