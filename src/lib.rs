//! Pagetally: a resilient page-count crawler
//!
//! This crate runs many independent crawl jobs, each counting items on one
//! target site across one or more paginated listings. Jobs can run together
//! on a single task, or one at a time in fresh worker processes with retry,
//! or spread over a pool of worker processes.

pub mod channel;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod job;
pub mod notify;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod strategy;
pub mod supervisor;

use thiserror::Error;

/// Main error type for Pagetally operations
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] strategy::StrategyError),

    #[error("Report error: {0}")]
    Report(#[from] report::ReportError),

    #[error("Notification error: {0}")]
    Notify(#[from] notify::NotifyError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("No configured job matches the selection")]
    NoJobsSelected,

    #[error("Job {job} failed: {error}")]
    JobFailed {
        job: String,
        error: state::ErrorRecord,
    },

    #[error("{} job(s) failed: {}", .0.len(), .0.join(", "))]
    JobsFailed(Vec<String>),

    #[error("Failed to spawn worker for {job}: {source}")]
    Spawn {
        job: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid rule for job '{job}': {message}")]
    InvalidRule { job: String, message: String },
}

/// Result type alias for Pagetally operations
pub type Result<T> = std::result::Result<T, TallyError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use job::{Job, Target};
pub use state::{ErrorOrigin, ErrorRecord, JobState};
