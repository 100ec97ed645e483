//! Cooperative and pool scheduling

use crate::common::{database_path, heading_page, heading_target, http_engine, job_entry, write_config};
use async_trait::async_trait;
use pagetally::job::{Job, Lifecycle};
use pagetally::report::{JobReport, MemoryReporter, ResultReporter, SqliteReporter};
use pagetally::scheduler::{run_cooperative, ItemRunner, Outcome, Pool, ProcessRunner, WorkItem};
use pagetally::{ErrorOrigin, TallyError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records every item it runs
#[derive(Default)]
struct RecordingRunner {
    runs: Mutex<Vec<String>>,
}

#[async_trait]
impl ItemRunner for RecordingRunner {
    async fn run_item(&self, item: &WorkItem) -> Result<bool, TallyError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.runs.lock().unwrap().push(item.job.clone());
        Ok(!item.job.starts_with("fail"))
    }
}

fn items(names: &[&str]) -> Vec<WorkItem> {
    names
        .iter()
        .map(|name| {
            let mut item = WorkItem::new("jobs.toml", *name);
            item.retry = Some(2);
            item
        })
        .collect()
}

#[tokio::test]
async fn test_pool_drains_every_item_once() {
    let names = ["a", "b", "c", "d", "e", "f", "g"];
    let runner = Arc::new(RecordingRunner::default());
    let pool = Pool::new(runner.clone(), Arc::new(MemoryReporter::new()), 3)
        .with_poll_interval(Duration::from_millis(50));

    let summary = pool.run(items(&names)).await;

    let runs = runner.runs.lock().unwrap().clone();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for run in &runs {
        *counts.entry(run.as_str()).or_default() += 1;
    }

    assert_eq!(runs.len(), names.len());
    for name in names {
        assert_eq!(counts.get(name), Some(&1), "{} not run exactly once", name);
    }
    assert_eq!(summary.outcomes.len(), names.len());
    assert!(summary.is_success());
}

#[tokio::test]
async fn test_pool_keeps_going_after_failures() {
    let runner = Arc::new(RecordingRunner::default());
    let pool = Pool::new(runner.clone(), Arc::new(MemoryReporter::new()), 2)
        .with_poll_interval(Duration::from_millis(50));

    let summary = pool.run(items(&["fail-1", "ok-1", "fail-2", "ok-2"])).await;

    assert_eq!(runner.runs.lock().unwrap().len(), 4);
    let mut failed = summary.failed();
    failed.sort();
    assert_eq!(failed, vec!["fail-1", "fail-2"]);
}

#[tokio::test]
async fn test_single_worker_pool() {
    let runner = Arc::new(RecordingRunner::default());
    let pool = Pool::new(runner.clone(), Arc::new(MemoryReporter::new()), 1)
        .with_poll_interval(Duration::from_millis(50));

    let summary = pool.run(items(&["a", "b", "c"])).await;

    assert_eq!(*runner.runs.lock().unwrap(), vec!["a", "b", "c"]);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.outcome == Outcome::Completed { total: None }));
}

#[tokio::test]
async fn test_cooperative_jobs_over_http() {
    let server = MockServer::start().await;
    for (route, text) in [("/a", "5 jobs"), ("/b", "8 jobs"), ("/c", "closed")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(heading_page(text)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let jobs = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let entry = job_entry(
                name,
                vec![heading_target(format!("{}/{}", server.uri(), name))],
            );
            Job::from_entry(&entry).unwrap()
        })
        .collect();

    let reporter = Arc::new(MemoryReporter::new());
    let lifecycle = Lifecycle::new(http_engine(), reporter.clone());
    let summary = run_cooperative(jobs, &lifecycle).await;

    assert_eq!(
        summary.outcomes[0].outcome,
        Outcome::Completed { total: Some(5) }
    );
    assert_eq!(
        summary.outcomes[1].outcome,
        Outcome::Completed { total: Some(8) }
    );
    assert!(matches!(summary.outcomes[2].outcome, Outcome::Failed { .. }));
    assert_eq!(reporter.reports().len(), 3);
    assert!(summary.into_result().is_err());
}

/// Never finishes its item
struct HangingRunner;

#[async_trait]
impl ItemRunner for HangingRunner {
    async fn run_item(&self, _item: &WorkItem) -> Result<bool, TallyError> {
        std::future::pending::<()>().await;
        Ok(true)
    }
}

#[tokio::test]
async fn test_timed_out_item_replaces_stored_total() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteReporter::new(&database_path(dir.path())).unwrap());
    store.report(&JobReport::new("stuck", "STUCK", 50, None)).unwrap();

    let mut item = WorkItem::new("jobs.toml", "stuck");
    item.label = Some("STUCK".to_string());
    let pool = Pool::new(Arc::new(HangingRunner), store.clone(), 1)
        .with_item_timeout(Duration::from_millis(50))
        .with_poll_interval(Duration::from_millis(20));

    let summary = pool.run(vec![item]).await;
    assert_eq!(summary.outcomes[0].outcome, Outcome::TimedOut);

    let latest = store.latest_reports().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].label, "STUCK");
    assert_eq!(latest[0].total, None);
    assert_eq!(
        latest[0].error.as_ref().map(|e| e.origin),
        Some(ErrorOrigin::Timeout)
    );
}

#[tokio::test]
async fn test_process_pool_runs_the_binary_per_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_body_string(heading_page("7 jobs")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), &["up", "down"]);
    let store = Arc::new(SqliteReporter::new(&database_path(dir.path())).unwrap());

    let items = ["up", "down"]
        .iter()
        .map(|name| {
            let mut item = WorkItem::new(&config, *name);
            item.label = Some(name.to_uppercase());
            item.log_dir = Some(dir.path().join("log"));
            item.log_name = Some("pool".to_string());
            item
        })
        .collect();
    let pool = Pool::new(
        Arc::new(ProcessRunner::new(env!("CARGO_BIN_EXE_pagetally"))),
        store.clone(),
        2,
    )
    .with_poll_interval(Duration::from_millis(200));

    let summary = pool.run(items).await;

    assert_eq!(summary.failed(), vec!["down"]);

    // Each child stored its own result; the pool added nothing on top
    let latest = store.latest_reports().unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].name, "down");
    assert_eq!(latest[0].total, None);
    assert_eq!(
        latest[0].error.as_ref().map(|e| e.origin),
        Some(ErrorOrigin::Request)
    );
    assert_eq!(latest[1].name, "up");
    assert_eq!(latest[1].total, Some(7));
}
