//! Console reporter

use crate::report::traits::{JobReport, ReportResult, ResultReporter};
use std::io::Write;

/// Prints each result block to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

/// Formats one report the way it is printed
pub fn format_report(report: &JobReport) -> String {
    let error = report
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "None".to_string());

    format!(
        "Company: {}\nDate: {}\nJV count: {}\nError message: {}\n",
        report.label,
        report.timestamp.format("%Y-%m-%d"),
        report.total_display(),
        error
    )
}

impl ResultReporter for ConsoleReporter {
    fn report(&self, report: &JobReport) -> ReportResult<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(format_report(report).as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
