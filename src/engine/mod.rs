//! Pagination-driven extraction engine
//!
//! For one job, the engine walks every target from its start page: fetch,
//! extract a count, add it to the total, then ask pagination for the next
//! page. Targets are walked concurrently on the current task; pages within
//! one target are fetched strictly one after another.
//!
//! A failure in any phase ends that target only. The error is logged,
//! recorded on the job and pushed to the error channel, and sibling targets
//! keep going. Pages are never retried individually; retry happens per job.

mod walk;

pub use walk::{PageVisit, PageWalk};

use crate::channel::ErrorSender;
use crate::fetch::Fetcher;
use crate::job::{Job, Target};
use crate::state::ErrorRecord;
use futures_util::future::join_all;
use std::sync::Arc;

/// Default cap on pages fetched for a single target
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// What walking one target produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOutcome {
    pub start_url: String,
    pub pages: u32,
    pub count: u64,
    pub error: Option<ErrorRecord>,
}

/// Drives the targets of a job through their page chains
#[derive(Clone)]
pub struct Engine {
    fetcher: Arc<dyn Fetcher>,
    max_pages: u32,
}

impl Engine {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Caps the number of pages fetched per target. A chain that would go
    /// past the cap fails with a pagination error.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Walks every target of `job`, accumulating its total
    ///
    /// # Arguments
    ///
    /// * `job` - The job to run; its targets are consumed
    /// * `errors` - Channel receiving every error as it happens
    pub async fn run(&self, job: &mut Job, errors: &ErrorSender) -> Vec<TargetOutcome> {
        let targets = job.take_targets();
        let name = job.name().to_string();

        let outcomes = join_all(
            targets
                .into_iter()
                .map(|target| self.walk_target(&name, target, errors)),
        )
        .await;

        for outcome in &outcomes {
            job.add_count(outcome.count);
            if let Some(error) = &outcome.error {
                job.record_error(error.clone());
            }
        }

        outcomes
    }

    async fn walk_target(&self, job: &str, target: Target, errors: &ErrorSender) -> TargetOutcome {
        let mut outcome = TargetOutcome {
            start_url: target.start_url.clone(),
            ..Default::default()
        };
        let mut walk = PageWalk::new(self.fetcher.as_ref(), target, self.max_pages);

        while let Some(step) = walk.next_visit().await {
            match step {
                Ok(visit) => {
                    tracing::trace!("{}: {} items on {}", job, visit.count, visit.url);
                    outcome.count += visit.count;
                }
                Err(error) => {
                    tracing::error!("{}: {}", job, error);
                    errors.push(error.clone()).await;
                    outcome.error = Some(error);
                }
            }
        }

        outcome.pages = walk.pages_visited();
        outcome
    }
}
