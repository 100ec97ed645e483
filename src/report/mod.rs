//! Result reporting
//!
//! Every job ends with exactly one `JobReport` handed to a `ResultReporter`.
//! This module handles:
//! - The report record and the reporter trait
//! - Printing results to the console
//! - Persisting results in SQLite
//! - Capturing a result in memory (isolated workers ship it to their supervisor)

mod console;
mod schema;
mod sqlite;
mod traits;

pub use console::ConsoleReporter;
pub use sqlite::SqliteReporter;
pub use traits::{
    JobReport, MemoryReporter, MultiReporter, ReportError, ReportResult, ResultReporter,
};
