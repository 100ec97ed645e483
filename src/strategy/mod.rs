//! Extraction and pagination strategies
//!
//! A target binds a start page to one `ExtractionStrategy` and, optionally,
//! one `PaginationStrategy`. The engine calls them once per fetched page:
//! extraction produces the page's count, pagination decides which page (if
//! any) comes next.
//!
//! Site-specific rules live outside the engine. The ones shipped here are
//! declarative CSS-selector rules built from the job configuration (see
//! `ExtractionRule` and `PaginationRule`).

mod rules;
mod selector;

pub use rules::{ExtractionRule, PaginationRule};
pub use selector::{NextLinkPagination, SelectorCountExtraction, SelectorRegexExtraction};

use crate::fetch::Page;
use thiserror::Error;

/// Errors raised by strategies
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("No element matches '{0}'")]
    MissingElement(String),

    #[error("Pattern '{pattern}' does not match '{text}'")]
    NoMatch { pattern: String, text: String },

    #[error("Value must be converted to an integer: '{0}'")]
    NotAnInteger(String),

    #[error("Count must be non-negative, got {0}")]
    NegativeCount(i64),

    #[error("Invalid next page URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Extracts a count from a fetched page
pub trait ExtractionStrategy: Send {
    /// Produces the raw count for `page`
    fn extract(&mut self, page: &Page) -> Result<i64, StrategyError>;

    /// Produces the validated, non-negative count for `page`
    fn get_count(&mut self, page: &Page) -> Result<u64, StrategyError> {
        let count = self.extract(page)?;
        u64::try_from(count).map_err(|_| StrategyError::NegativeCount(count))
    }

    /// Releases anything held for this target. Called exactly once per target visit.
    fn dispose(&mut self) {}
}

/// Resolves the page that follows a fetched page
pub trait PaginationStrategy: Send {
    /// Returns the next page's URL, or `None` when `page` is the last one
    fn get_next_url(&mut self, page: &Page, count: u64) -> Result<Option<String>, StrategyError>;

    /// Releases anything held for this target. Called exactly once per target visit.
    fn dispose(&mut self) {}
}
