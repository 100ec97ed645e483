use crate::strategy::{ExtractionRule, PaginationRule};
use serde::{Deserialize, Serialize};

/// Main configuration structure for Pagetally
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobEntry>,
}

/// Scheduling and engine limits
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Wall-clock budget for one pool item (seconds)
    #[serde(rename = "pool-timeout-secs", default = "default_pool_timeout_secs")]
    pub pool_timeout_secs: u64,

    /// How long an idle pool worker waits on the queue before it stops (seconds)
    #[serde(rename = "queue-poll-secs", default = "default_queue_poll_secs")]
    pub queue_poll_secs: u64,

    /// Maximum pages visited per target
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Total time budget for one page request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_pool_timeout_secs() -> u64 {
    24 * 3600
}

fn default_queue_poll_secs() -> u64 {
    5
}

fn default_max_pages() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pool_timeout_secs: default_pool_timeout_secs(),
            queue_poll_secs: default_queue_poll_secs(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite results database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Print each job result to stdout as well
    #[serde(default = "default_true")]
    pub console: bool,
}

fn default_true() -> bool {
    true
}

/// Email notification settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(rename = "from-email")]
    pub from_email: String,

    #[serde(rename = "from-name")]
    pub from_name: String,

    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(rename = "api-url", default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

fn default_subject() -> String {
    "Latest scraping results".to_string()
}

fn default_api_url() -> String {
    "https://api.mailjet.com/v3/send".to_string()
}

/// One email recipient
#[derive(Debug, Clone, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One configured crawl job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    /// Unique job name, used on the command line
    pub name: String,

    /// Name of the counted entity, e.g. the company whose vacancies are counted
    #[serde(default)]
    pub label: Option<String>,

    /// Group tags; selecting a group selects every job carrying it
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

impl JobEntry {
    /// The label, falling back to the job name
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Returns true if `selector` names this job or one of its groups
    pub fn matches(&self, selector: &str) -> bool {
        self.name == selector || self.groups.iter().any(|g| g == selector)
    }
}

/// One start page with its strategy rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEntry {
    pub url: String,
    pub extraction: ExtractionRule,
    #[serde(default)]
    pub pagination: Option<PaginationRule>,
}
