//! Result notification by email
//!
//! After a run, `--email` mails a summary of the latest result of every job.
//! Mailjet's v3 send API is the only transport.

mod mailjet;

pub use mailjet::{render_html, MailjetNotifier, MAILJET_KEY_VAR, MAILJET_SECRET_VAR};

use crate::report::JobReport;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while sending a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification is not configured: {0}")]
    NotConfigured(String),

    #[error("Missing environment variable {0}")]
    MissingCredential(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends a summary of job results
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, reports: &[JobReport]) -> Result<(), NotifyError>;
}
