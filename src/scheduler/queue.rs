//! Shared work queue for pool mode

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Everything needed to re-launch one job as its own invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkItem {
    pub config: PathBuf,
    pub job: String,
    /// Label used when the pool has to report the item itself
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub retry: Option<u32>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub verbose: u8,
    #[serde(default)]
    pub quiet: bool,
}

impl WorkItem {
    pub fn new(config: impl Into<PathBuf>, job: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            job: job.into(),
            label: None,
            retry: None,
            log_dir: None,
            log_name: None,
            verbose: 0,
            quiet: false,
        }
    }

    /// The label, falling back to the job name
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.job)
    }

    /// Command-line arguments that run this item
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.config.display().to_string()];
        if let Some(retry) = self.retry {
            args.push("--retry".to_string());
            args.push(retry.to_string());
        }
        if let Some(dir) = &self.log_dir {
            args.push("--log-dir".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(name) = &self.log_name {
            args.push("--log".to_string());
            args.push(name.clone());
        }
        if self.quiet {
            args.push("-q".to_string());
        } else if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(self.verbose as usize)));
        }
        args.push(self.job.clone());
        args
    }
}

/// Multi-consumer queue of work items
///
/// The queue is filled once up front. Each `poll` claims at most one item,
/// and no item is handed out twice.
pub struct WorkQueue {
    rx: Mutex<mpsc::UnboundedReceiver<WorkItem>>,
}

impl WorkQueue {
    pub fn new(items: impl IntoIterator<Item = WorkItem>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in items {
            // The receiver is alive, so this cannot fail
            let _ = tx.send(item);
        }
        Self { rx: Mutex::new(rx) }
    }

    /// Claims the next item, waiting at most `wait`
    ///
    /// Returns `None` when the queue is drained or nothing arrived in time.
    pub async fn poll(&self, wait: Duration) -> Option<WorkItem> {
        tokio::time::timeout(wait, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten()
    }
}
