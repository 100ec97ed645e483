//! Shared fixtures

use pagetally::config::{JobEntry, TargetEntry, UserAgentConfig};
use pagetally::engine::Engine;
use pagetally::fetch::HttpFetcher;
use pagetally::strategy::{ExtractionRule, PaginationRule};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// An engine fetching over real HTTP
pub fn http_engine() -> Engine {
    let fetcher = HttpFetcher::from_config(&user_agent(), Duration::from_secs(5))
        .expect("Failed to build fetcher");
    Engine::new(Arc::new(fetcher))
}

/// Counts `li.job` elements and follows `a.next`
pub fn listing_target(url: String) -> TargetEntry {
    TargetEntry {
        url,
        extraction: ExtractionRule::SelectorCount {
            selector: "li.job".to_string(),
        },
        pagination: Some(PaginationRule::NextLink {
            selector: "a.next".to_string(),
        }),
    }
}

/// Reads the count from a "N jobs" heading, single page
pub fn heading_target(url: String) -> TargetEntry {
    TargetEntry {
        url,
        extraction: ExtractionRule::SelectorRegex {
            selector: "h1".to_string(),
            pattern: r"(\d+) jobs".to_string(),
        },
        pagination: None,
    }
}

pub fn job_entry(name: &str, targets: Vec<TargetEntry>) -> JobEntry {
    JobEntry {
        name: name.to_string(),
        label: Some(name.to_uppercase()),
        groups: vec![],
        targets,
    }
}

/// A listing page with `count` items and an optional next link
pub fn listing_page(count: usize, next: Option<&str>) -> String {
    let items: String = (0..count)
        .map(|i| format!("<li class=\"job\">Job {}</li>", i))
        .collect();
    let next = next
        .map(|href| format!("<a class=\"next\" href=\"{}\">Next</a>", href))
        .unwrap_or_default();
    format!("<html><body><ul>{}</ul>{}</body></html>", items, next)
}

pub fn heading_page(text: &str) -> String {
    format!("<html><body><h1>{}</h1></body></html>", text)
}

/// Writes a config file for the real binary into `dir`
///
/// Results go to `dir/results.db`. Each job has one heading target served at
/// `<server>/<job name>`.
pub fn write_config(dir: &Path, server: &str, jobs: &[&str]) -> PathBuf {
    let mut content = format!(
        r#"
[runner]
request-timeout-secs = 5

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = '{}'
console = false
"#,
        database_path(dir).display()
    );

    for job in jobs {
        write!(
            content,
            r#"
[[job]]
name = "{job}"
label = "{label}"

[[job.target]]
url = "{server}/{job}"
extraction = {{ kind = "selector-regex", selector = "h1", pattern = '(\d+) jobs' }}
"#,
            job = job,
            label = job.to_uppercase(),
            server = server
        )
        .expect("Failed to render job");
    }

    let path = dir.join("jobs.toml");
    std::fs::write(&path, content).expect("Failed to write config");
    path
}

pub fn database_path(dir: &Path) -> PathBuf {
    dir.join("results.db")
}
