//! Lazy page-by-page traversal of one target

use crate::fetch::Fetcher;
use crate::job::Target;
use crate::state::ErrorRecord;
use crate::strategy::{ExtractionStrategy, PaginationStrategy};

/// One step of a walk: a page that was fetched and counted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageVisit {
    /// The URL that was requested
    pub url: String,

    /// The count extracted from the page
    pub count: u64,

    /// The page the pagination strategy resolved next, if any
    pub next_url: Option<String>,
}

/// Owns a target's strategy pair and disposes it exactly once
struct StrategyPair {
    extraction: Box<dyn ExtractionStrategy>,
    pagination: Option<Box<dyn PaginationStrategy>>,
    disposed: bool,
}

impl StrategyPair {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.extraction.dispose();
        if let Some(pagination) = self.pagination.as_mut() {
            pagination.dispose();
        }
    }
}

impl Drop for StrategyPair {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Walks one target's page chain
///
/// Each call to `next_visit` fetches exactly one page, so pages of one chain
/// are strictly sequential. The walk ends when pagination resolves no next
/// page or when any phase fails; an error ends the walk for this target only.
/// The strategy pair is disposed as soon as the walk ends, and at the latest
/// when the walk is dropped.
pub struct PageWalk<'a> {
    fetcher: &'a dyn Fetcher,
    strategies: StrategyPair,
    next_url: Option<String>,
    pages: u32,
    max_pages: u32,
}

impl<'a> PageWalk<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, target: Target, max_pages: u32) -> Self {
        Self {
            fetcher,
            strategies: StrategyPair {
                extraction: target.extraction,
                pagination: target.pagination,
                disposed: false,
            },
            next_url: Some(target.start_url),
            pages: 0,
            max_pages,
        }
    }

    /// Number of pages fetched so far
    pub fn pages_visited(&self) -> u32 {
        self.pages
    }

    /// Fetches and counts the next page, or returns `None` once the chain is
    /// exhausted or an error has ended it
    pub async fn next_visit(&mut self) -> Option<Result<PageVisit, ErrorRecord>> {
        let url = self.next_url.take()?;

        let result = if self.pages >= self.max_pages {
            Err(ErrorRecord::pagination(format!(
                "Page limit of {} reached before {}",
                self.max_pages, url
            )))
        } else {
            self.visit(&url).await
        };

        if let Ok(visit) = &result {
            self.next_url = visit.next_url.clone();
        }
        if self.next_url.is_none() {
            self.strategies.dispose();
        }

        Some(result)
    }

    async fn visit(&mut self, url: &str) -> Result<PageVisit, ErrorRecord> {
        tracing::debug!("Scraping: {}", url);

        self.pages += 1;
        let page = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| ErrorRecord::request(e.to_string()))?;

        let count = self
            .strategies
            .extraction
            .get_count(&page)
            .map_err(|e| ErrorRecord::extraction(format!("{}: {}", url, e)))?;

        let next_url = match self.strategies.pagination.as_mut() {
            Some(pagination) => pagination
                .get_next_url(&page, count)
                .map_err(|e| ErrorRecord::pagination(format!("{}: {}", url, e)))?,
            None => None,
        };

        Ok(PageVisit {
            url: url.to_string(),
            count,
            next_url,
        })
    }
}
