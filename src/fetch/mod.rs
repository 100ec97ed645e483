//! Page fetching
//!
//! The engine never talks to the network directly. It asks a `Fetcher` for a
//! page and treats any failure as a request-phase error. `HttpFetcher` is the
//! reqwest-backed implementation used by the binary.

mod http;

pub use http::{build_http_client, HttpFetcher};

use async_trait::async_trait;
use thiserror::Error;

/// A fetched page handed to extraction and pagination strategies
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
        }
    }
}

/// Errors that can occur while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection refused for {url}")]
    Connect { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },
}

/// Fetches pages for the extraction engine
///
/// Implementations must be safe to share between the concurrently walked
/// targets of a job.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the page at `url`
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}
