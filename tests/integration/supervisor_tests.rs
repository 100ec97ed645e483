//! Retry supervision
//!
//! Most tests launch in-process workers: each launch runs a real job attempt
//! on its own task and streams the error channel through an in-memory pipe,
//! the same bytes a worker process writes on stdout. The last tests launch
//! the built binary as real worker processes.

use crate::common::{heading_page, heading_target, job_entry, write_config};
use async_trait::async_trait;
use pagetally::channel::wire::SignalReader;
use pagetally::channel::Signal;
use pagetally::config::JobEntry;
use pagetally::engine::Engine;
use pagetally::fetch::{FetchError, Fetcher, Page};
use pagetally::report::MemoryReporter;
use pagetally::scheduler::{run_supervised, Outcome};
use pagetally::supervisor::{
    serve_attempt, IsolatedWorker, ProcessLauncher, Supervisor, WorkerExit, WorkerLauncher,
};
use pagetally::{ErrorOrigin, TallyError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{BufReader, DuplexStream};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What a given attempt does
#[derive(Clone)]
enum Attempt {
    /// Serves this page body to every request
    Serve(String),
    /// Dies without writing the sentinel
    Crash,
}

struct FixedPage(String);

#[async_trait]
impl Fetcher for FixedPage {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        Ok(Page::new(url, self.0.clone()))
    }
}

struct InProcessLauncher {
    entry: JobEntry,
    attempts: Vec<Attempt>,
    launches: AtomicU32,
}

impl InProcessLauncher {
    fn new(entry: JobEntry, attempts: Vec<Attempt>) -> Self {
        Self {
            entry,
            attempts,
            launches: AtomicU32::new(0),
        }
    }

    fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

struct InProcessWorker {
    reader: SignalReader<BufReader<DuplexStream>>,
    handle: JoinHandle<bool>,
}

#[async_trait]
impl IsolatedWorker for InProcessWorker {
    async fn next_signal(&mut self) -> Option<Signal> {
        self.reader.next_signal().await.ok().flatten()
    }

    async fn join(self: Box<Self>) -> Result<WorkerExit, TallyError> {
        let success = self.handle.await.unwrap_or(false);
        Ok(WorkerExit {
            success,
            code: Some(if success { 0 } else { 1 }),
        })
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn launch(&self, _job: &str, attempt: u32) -> Result<Box<dyn IsolatedWorker>, TallyError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let script = self
            .attempts
            .get(attempt as usize - 1)
            .cloned()
            .unwrap_or(Attempt::Crash);

        let (client, mut server) = tokio::io::duplex(4096);
        let entry = self.entry.clone();

        let handle = tokio::spawn(async move {
            match script {
                Attempt::Serve(body) => {
                    let engine = Engine::new(Arc::new(FixedPage(body)));
                    serve_attempt(engine, &entry, &mut server).await.unwrap_or(false)
                }
                Attempt::Crash => false,
            }
        });

        Ok(Box::new(InProcessWorker {
            reader: SignalReader::new(BufReader::new(client)),
            handle,
        }))
    }
}

fn entry(name: &str) -> JobEntry {
    job_entry(name, vec![heading_target("https://b.example/jobs".to_string())])
}

fn good(count: u32) -> Attempt {
    Attempt::Serve(heading_page(&format!("{} jobs", count)))
}

fn bad() -> Attempt {
    Attempt::Serve(heading_page("no vacancies listed"))
}

#[tokio::test]
async fn test_scenario_recovers_on_second_attempt() {
    let launcher = Arc::new(InProcessLauncher::new(entry("b"), vec![bad(), good(7)]));
    let reporter = Arc::new(MemoryReporter::new());
    let supervisor = Supervisor::new(launcher.clone(), reporter.clone());

    let supervised = supervisor.run_entry(&entry("b"), 3).await.unwrap();

    assert_eq!(launcher.launches(), 2);
    assert_eq!(supervised.attempts, 2);
    assert_eq!(supervised.report.total, Some(7));

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total, Some(7));
}

#[tokio::test]
async fn test_exhaustion_launches_exactly_n_workers() {
    let launcher = Arc::new(InProcessLauncher::new(
        entry("b"),
        vec![bad(), bad(), bad(), good(1)],
    ));
    let reporter = Arc::new(MemoryReporter::new());
    let supervisor = Supervisor::new(launcher.clone(), reporter.clone());

    let err = supervisor.run_entry(&entry("b"), 3).await.unwrap_err();

    assert_eq!(launcher.launches(), 3);
    match err {
        TallyError::JobFailed { job, error } => {
            assert_eq!(job, "b");
            assert_eq!(error.origin, ErrorOrigin::Extraction);
        }
        other => panic!("unexpected error: {}", other),
    }

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total, None);
    assert!(reports[0].error.is_some());
}

#[tokio::test]
async fn test_crash_is_retried() {
    let launcher = Arc::new(InProcessLauncher::new(
        entry("b"),
        vec![Attempt::Crash, good(3)],
    ));
    let supervisor = Supervisor::new(launcher.clone(), Arc::new(MemoryReporter::new()));

    let supervised = supervisor.run_entry(&entry("b"), 2).await.unwrap();
    assert_eq!(launcher.launches(), 2);
    assert_eq!(supervised.report.total, Some(3));
}

#[tokio::test]
async fn test_crash_on_last_trial_is_reported() {
    let launcher = Arc::new(InProcessLauncher::new(entry("b"), vec![Attempt::Crash]));
    let reporter = Arc::new(MemoryReporter::new());
    let supervisor = Supervisor::new(launcher.clone(), reporter.clone());

    let err = supervisor.run_entry(&entry("b"), 1).await.unwrap_err();
    assert!(matches!(
        err,
        TallyError::JobFailed { ref error, .. } if error.origin == ErrorOrigin::WorkerCrash
    ));

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].label, "B");
    assert_eq!(reports[0].total, None);
}

#[tokio::test]
async fn test_sequential_supervision_continues_after_failure() {
    let failing = entry("b");
    let passing = entry("c");

    // One launcher per job name keeps the scripts apart
    struct PerJob {
        b: InProcessLauncher,
        c: InProcessLauncher,
    }

    #[async_trait]
    impl WorkerLauncher for PerJob {
        async fn launch(&self, job: &str, attempt: u32) -> Result<Box<dyn IsolatedWorker>, TallyError> {
            match job {
                "b" => self.b.launch(job, attempt).await,
                _ => self.c.launch(job, attempt).await,
            }
        }
    }

    let launcher = Arc::new(PerJob {
        b: InProcessLauncher::new(failing.clone(), vec![bad(), bad()]),
        c: InProcessLauncher::new(passing.clone(), vec![good(5)]),
    });
    let reporter = Arc::new(MemoryReporter::new());
    let supervisor = Supervisor::new(launcher, reporter.clone());

    let summary = run_supervised(&[&failing, &passing], &supervisor, 2).await;

    assert_eq!(summary.outcomes.len(), 2);
    assert!(matches!(summary.outcomes[0].outcome, Outcome::Failed { .. }));
    assert_eq!(
        summary.outcomes[1].outcome,
        Outcome::Completed { total: Some(5) }
    );
    assert_eq!(summary.failed(), vec!["b"]);
    assert_eq!(reporter.reports().len(), 2);
}

fn process_launcher(dir: &TempDir, config: &std::path::Path) -> ProcessLauncher {
    ProcessLauncher::new(env!("CARGO_BIN_EXE_pagetally"), config)
        .with_log(dir.path().join("log"), "workers")
}

#[tokio::test]
async fn test_process_worker_reports_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_body_string(heading_page("7 jobs")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), &["up"]);
    let reporter = Arc::new(MemoryReporter::new());
    let supervisor = Supervisor::new(Arc::new(process_launcher(&dir, &config)), reporter.clone());

    let supervised = supervisor.run_with_retry("up", "UP", 2).await.unwrap();

    assert_eq!(supervised.attempts, 1);
    assert_eq!(supervised.report.total, Some(7));
    assert_eq!(supervised.report.label, "UP");
    assert_eq!(reporter.reports().len(), 1);
}

#[tokio::test]
async fn test_process_workers_retry_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), &["down"]);
    let reporter = Arc::new(MemoryReporter::new());
    let supervisor = Supervisor::new(Arc::new(process_launcher(&dir, &config)), reporter.clone());

    match supervisor.run_with_retry("down", "DOWN", 2).await {
        Err(TallyError::JobFailed { job, error }) => {
            assert_eq!(job, "down");
            assert_eq!(error.origin, ErrorOrigin::Request);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total, None);
    assert_eq!(
        reports[0].error.as_ref().map(|e| e.origin),
        Some(ErrorOrigin::Request)
    );
}
