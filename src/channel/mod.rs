//! Error channel between a running job and whoever supervises it
//!
//! Protocol: zero or more `Signal::Error` messages followed by exactly one
//! `Signal::Finished` sentinel. The sentinel carries the attempt's captured
//! `JobReport`, if the job got far enough to produce one.
//!
//! Inside one process the channel is a bounded tokio mpsc. Across the process
//! boundary the same signals travel as newline-delimited JSON (see `wire`).
//! `ErrorSender::finish` consumes the sender, so a sender can emit at most one
//! sentinel.

pub mod wire;

use crate::report::JobReport;
use crate::state::ErrorRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Capacity of the in-process error channel
pub const CHANNEL_CAPACITY: usize = 64;

/// One message on the error channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Signal {
    /// An error captured during the run
    Error { error: ErrorRecord },

    /// Sentinel: no more errors will follow for this attempt
    Finished { report: Option<JobReport> },
}

/// Creates a connected sender/receiver pair
pub fn error_channel() -> (ErrorSender, ErrorReceiver) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (ErrorSender { tx }, ErrorReceiver { rx })
}

/// Producer half, held by the job runner
#[derive(Debug)]
pub struct ErrorSender {
    tx: mpsc::Sender<Signal>,
}

impl ErrorSender {
    /// Pushes one captured error
    pub async fn push(&self, error: ErrorRecord) {
        if self.tx.send(Signal::Error { error }).await.is_err() {
            tracing::warn!("Error channel closed, error not delivered");
        }
    }

    /// Writes the sentinel and closes the channel
    pub async fn finish(self, report: Option<JobReport>) {
        if self.tx.send(Signal::Finished { report }).await.is_err() {
            tracing::warn!("Error channel closed before the sentinel was written");
        }
    }
}

/// Consumer half, held by the supervisor
#[derive(Debug)]
pub struct ErrorReceiver {
    rx: mpsc::Receiver<Signal>,
}

/// Everything read from one attempt's channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    /// Errors in the order they were pushed
    pub errors: Vec<ErrorRecord>,

    /// The report carried by the sentinel
    pub report: Option<JobReport>,

    /// False if the channel closed before the sentinel arrived
    pub finished: bool,
}

impl ErrorReceiver {
    /// Receives the next signal, or `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }

    /// Stops accepting signals; later pushes fail without waiting
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Reads until the sentinel (or until the channel closes without one)
    pub async fn drain(&mut self) -> Drained {
        let mut drained = Drained::default();

        while let Some(signal) = self.recv().await {
            match signal {
                Signal::Error { error } => drained.errors.push(error),
                Signal::Finished { report } => {
                    drained.report = report;
                    drained.finished = true;
                    break;
                }
            }
        }

        drained
    }
}
