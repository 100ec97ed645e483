//! SQLite results store
//!
//! Pool workers and supervised runs are separate processes writing to the same
//! database file, so the connection runs in WAL mode with a busy timeout.

use crate::report::schema::initialize_schema;
use crate::report::traits::{JobReport, ReportError, ReportResult, ResultReporter};
use crate::state::{ErrorOrigin, ErrorRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// SQLite-backed reporter
pub struct SqliteReporter {
    conn: Mutex<Connection>,
}

fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_report(row: &Row<'_>) -> rusqlite::Result<JobReport> {
    let total: Option<i64> = row.get(2)?;
    let error_message: Option<String> = row.get(3)?;
    let error_origin: Option<String> = row.get(4)?;
    let reported_at: String = row.get(5)?;

    let timestamp = DateTime::parse_from_rfc3339(&reported_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    let error = error_message.map(|message| {
        let origin = error_origin
            .as_deref()
            .and_then(ErrorOrigin::from_db_string)
            .unwrap_or(ErrorOrigin::Request);
        ErrorRecord::new(origin, message)
    });

    Ok(JobReport {
        name: row.get(0)?,
        label: row.get(1)?,
        total: total.and_then(|t| u64::try_from(t).ok()),
        error,
        timestamp,
    })
}

impl SqliteReporter {
    /// Opens (or creates) the results database at `path`
    ///
    /// Missing parent directories are created.
    pub fn new(path: &Path) -> ReportResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> ReportResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// The most recent report of every job, ordered by job name
    pub fn latest_reports(&self) -> ReportResult<Vec<JobReport>> {
        let conn = self.conn.lock().map_err(|_| ReportError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT job_name, label, total, error_message, error_origin, reported_at
             FROM job_results r
             WHERE id = (SELECT MAX(id) FROM job_results WHERE job_name = r.job_name)
             ORDER BY job_name",
        )?;

        let reports = stmt
            .query_map([], row_to_report)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reports)
    }

}

impl ResultReporter for SqliteReporter {
    fn report(&self, report: &JobReport) -> ReportResult<()> {
        let conn = self.conn.lock().map_err(|_| ReportError::Poisoned)?;

        let total = report.total.and_then(|t| i64::try_from(t).ok());
        let (error_message, error_origin) = match &report.error {
            Some(error) => (Some(error.message.as_str()), Some(error.origin.as_str())),
            None => (None, None),
        };

        conn.execute(
            "INSERT INTO job_results (job_name, label, total, error_message, error_origin, reported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.name,
                report.label,
                total,
                error_message,
                error_origin,
                to_db_timestamp(&report.timestamp)
            ],
        )?;

        tracing::debug!("Stored result for {}", report.name);
        Ok(())
    }

    fn reported_since(&self, job: &str, since: &DateTime<Utc>) -> ReportResult<bool> {
        let conn = self.conn.lock().map_err(|_| ReportError::Poisoned)?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM job_results WHERE job_name = ?1 AND reported_at >= ?2)",
            params![job, to_db_timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(found)
    }
}
