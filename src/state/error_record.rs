//! Error records carried by jobs and across the worker error channel

use serde::{Deserialize, Serialize};
use std::fmt;

/// The phase that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorOrigin {
    /// Fetching a page failed
    Request,

    /// The extraction strategy failed or produced an invalid count
    Extraction,

    /// Resolving the next page failed
    Pagination,

    /// An isolated worker ended without reaching its sentinel
    WorkerCrash,

    /// A pool item exceeded its wall-clock budget
    Timeout,

    /// Handing the final result to the reporter failed
    Reporting,
}

impl ErrorOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Extraction => "extraction",
            Self::Pagination => "pagination",
            Self::WorkerCrash => "worker-crash",
            Self::Timeout => "timeout",
            Self::Reporting => "reporting",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "extraction" => Some(Self::Extraction),
            "pagination" => Some(Self::Pagination),
            "worker-crash" => Some(Self::WorkerCrash),
            "timeout" => Some(Self::Timeout),
            "reporting" => Some(Self::Reporting),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error retained for a job attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Human-readable description
    pub message: String,

    /// Which phase produced the error
    pub origin: ErrorOrigin,
}

impl ErrorRecord {
    pub fn new(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin,
        }
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::Request, message)
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::Extraction, message)
    }

    pub fn pagination(message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::Pagination, message)
    }

    pub fn worker_crash(message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::WorkerCrash, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::Timeout, message)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.origin, self.message)
    }
}

impl std::error::Error for ErrorRecord {}
