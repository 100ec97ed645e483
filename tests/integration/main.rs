//! Integration tests for Pagetally
//!
//! Mock HTTP servers (wiremock) stand in for target sites; in-process fakes
//! stand in for worker processes.

mod common;
mod pagination_tests;
mod scheduler_tests;
mod supervisor_tests;
