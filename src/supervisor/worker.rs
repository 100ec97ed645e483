//! Process-backed isolated workers
//!
//! The supervisor side spawns this same binary with `--isolated-worker` and
//! reads the error channel from the child's stdout. The worker side
//! (`serve_attempt`) runs one job attempt and writes the channel to stdout.

use crate::channel::wire::{forward, SignalReader};
use crate::channel::{error_channel, Signal};
use crate::config::JobEntry;
use crate::engine::Engine;
use crate::job::{Job, Lifecycle};
use crate::report::MemoryReporter;
use crate::state::ErrorRecord;
use crate::supervisor::{IsolatedWorker, WorkerExit, WorkerLauncher};
use crate::TallyError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncWrite, BufReader};
use tokio::process::{Child, ChildStdout, Command};

/// Launches workers by re-invoking a program with `--isolated-worker`
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config: PathBuf,
    log_dir: Option<PathBuf>,
    log_name: Option<String>,
    verbose: u8,
    quiet: bool,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config: config.into(),
            log_dir: None,
            log_name: None,
            verbose: 0,
            quiet: false,
        }
    }

    /// Launches workers of the running executable
    pub fn current_exe(config: impl Into<PathBuf>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config))
    }

    /// Makes workers log into the same file as the supervisor
    pub fn with_log(mut self, log_dir: impl Into<PathBuf>, log_name: impl Into<String>) -> Self {
        self.log_dir = Some(log_dir.into());
        self.log_name = Some(log_name.into());
        self
    }

    /// Passes the supervisor's `-v` count, or `-q` when `quiet`, to workers
    pub fn with_verbosity(mut self, verbose: u8, quiet: bool) -> Self {
        self.verbose = verbose;
        self.quiet = quiet;
        self
    }

    /// Arguments passed to the worker for `job`
    pub fn args(&self, job: &str) -> Vec<String> {
        let mut args = vec![
            self.config.display().to_string(),
            "--isolated-worker".to_string(),
        ];
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
        args.push(job.to_string());
        args
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, job: &str, attempt: u32) -> Result<Box<dyn IsolatedWorker>, TallyError> {
        tracing::debug!("Launching worker for {} (attempt {})", job, attempt);

        let mut child = Command::new(&self.program)
            .args(self.args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TallyError::Spawn {
                job: job.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| TallyError::Spawn {
            job: job.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "worker stdout not captured"),
        })?;

        Ok(Box::new(ProcessWorker {
            job: job.to_string(),
            child,
            reader: SignalReader::new(BufReader::new(stdout)),
        }))
    }
}

/// A worker running as a child process
pub struct ProcessWorker {
    job: String,
    child: Child,
    reader: SignalReader<BufReader<ChildStdout>>,
}

#[async_trait]
impl IsolatedWorker for ProcessWorker {
    async fn next_signal(&mut self) -> Option<Signal> {
        match self.reader.next_signal().await {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!("Lost error channel of {}: {}", self.job, e);
                None
            }
        }
    }

    async fn join(mut self: Box<Self>) -> Result<WorkerExit, TallyError> {
        let status = self.child.wait().await?;
        tracing::debug!("Worker for {} exited: {}", self.job, status);
        Ok(WorkerExit {
            success: status.success(),
            code: status.code(),
        })
    }
}

/// Runs one attempt of `entry` and streams its error channel to `writer`
///
/// The channel always ends with exactly one sentinel carrying the captured
/// report. Returns true if the attempt finished without errors.
pub async fn serve_attempt<W>(engine: Engine, entry: &JobEntry, writer: &mut W) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let reporter = Arc::new(MemoryReporter::new());
    let lifecycle = Lifecycle::new(engine, reporter.clone());
    let (tx, mut rx) = error_channel();

    let run = async move {
        match Job::from_entry(entry) {
            Ok(mut job) => {
                let report = lifecycle.run(&mut job, &tx).await;
                let success = report.is_success();
                tx.finish(reporter.take_last().or(Some(report))).await;
                success
            }
            Err(e) => {
                let error = ErrorRecord::worker_crash(format!("Cannot build {}: {}", entry.name, e));
                tracing::error!("{}", error);
                tx.push(error).await;
                tx.finish(None).await;
                false
            }
        }
    };

    let (success, forwarded) = tokio::join!(run, forward(&mut rx, writer));
    forwarded?;
    Ok(success)
}
