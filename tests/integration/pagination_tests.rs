//! Engine walks over real HTTP

use crate::common::{heading_page, heading_target, http_engine, job_entry, listing_page, listing_target};
use pagetally::channel::error_channel;
use pagetally::job::{Job, Lifecycle};
use pagetally::report::{MemoryReporter, SqliteReporter};
use pagetally::{ErrorOrigin, JobState};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: String, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_unpaginated_target_fetches_one_page() {
    let server = MockServer::start().await;
    serve(&server, "/jobs", heading_page("42 jobs found"), 1).await;
    // Linked but never followed: the target has no pagination
    serve(&server, "/jobs/2", heading_page("1 jobs found"), 0).await;

    let entry = job_entry("acme", vec![heading_target(format!("{}/jobs", server.uri()))]);
    let mut job = Job::from_entry(&entry).unwrap();

    let (tx, _rx) = error_channel();
    http_engine().run(&mut job, &tx).await;

    assert_eq!(job.total(), Some(42));
}

#[tokio::test]
async fn test_paginated_target_fetches_every_page_once() {
    let server = MockServer::start().await;
    serve(&server, "/list/1", listing_page(4, Some("/list/2")), 1).await;
    serve(&server, "/list/2", listing_page(4, Some("3")), 1).await;
    serve(&server, "/list/3", listing_page(1, None), 1).await;

    let entry = job_entry("acme", vec![listing_target(format!("{}/list/1", server.uri()))]);
    let mut job = Job::from_entry(&entry).unwrap();

    let (tx, _rx) = error_channel();
    let outcomes = http_engine().run(&mut job, &tx).await;

    assert_eq!(outcomes[0].pages, 3);
    assert_eq!(job.total(), Some(9));
}

#[tokio::test]
async fn test_scenario_two_targets_total_ten() {
    let server = MockServer::start().await;
    serve(&server, "/a", heading_page("5 jobs"), 1).await;
    serve(&server, "/b/1", listing_page(3, Some("/b/2")), 1).await;
    serve(&server, "/b/2", listing_page(2, Some("/b/3")), 1).await;
    serve(&server, "/b/3", listing_page(0, None), 1).await;

    let entry = job_entry(
        "a",
        vec![
            heading_target(format!("{}/a", server.uri())),
            listing_target(format!("{}/b/1", server.uri())),
        ],
    );
    let mut job = Job::from_entry(&entry).unwrap();

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("results.db");
    let sqlite = Arc::new(SqliteReporter::new(&db_path).unwrap());
    let lifecycle = Lifecycle::new(http_engine(), sqlite.clone());

    let (tx, mut rx) = error_channel();
    let report = lifecycle.run(&mut job, &tx).await;
    tx.finish(None).await;

    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(report.total, Some(10));
    assert!(rx.drain().await.errors.is_empty());

    let stored = sqlite.latest_reports().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].total, Some(10));
    assert_eq!(stored[0].label, "A");
}

#[tokio::test]
async fn test_server_error_invalidates_total() {
    let server = MockServer::start().await;
    serve(&server, "/a", heading_page("5 jobs"), 1).await;
    serve(&server, "/b/1", listing_page(3, Some("/b/2")), 1).await;
    Mock::given(method("GET"))
        .and(path("/b/2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let entry = job_entry(
        "a",
        vec![
            heading_target(format!("{}/a", server.uri())),
            listing_target(format!("{}/b/1", server.uri())),
        ],
    );
    let mut job = Job::from_entry(&entry).unwrap();
    let reporter = Arc::new(MemoryReporter::new());
    let lifecycle = Lifecycle::new(http_engine(), reporter.clone());

    let (tx, mut rx) = error_channel();
    let report = lifecycle.run(&mut job, &tx).await;
    tx.finish(None).await;

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(report.total, None);
    assert_eq!(
        report.error.as_ref().map(|e| e.origin),
        Some(ErrorOrigin::Request)
    );

    let drained = rx.drain().await;
    assert_eq!(drained.errors.len(), 1);
    assert_eq!(reporter.reports().len(), 1);
}

#[tokio::test]
async fn test_unparseable_count_is_extraction_error() {
    let server = MockServer::start().await;
    serve(&server, "/a", heading_page("Lots of jobs"), 1).await;

    let entry = job_entry("a", vec![heading_target(format!("{}/a", server.uri()))]);
    let mut job = Job::from_entry(&entry).unwrap();

    let (tx, _rx) = error_channel();
    http_engine().run(&mut job, &tx).await;

    assert_eq!(
        job.error().map(|e| e.origin),
        Some(ErrorOrigin::Extraction)
    );
    assert_eq!(job.total(), None);
}
