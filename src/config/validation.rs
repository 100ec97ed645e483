use crate::config::types::{Config, JobEntry, NotifyConfig, RunnerConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_runner_config(&config.runner)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    if let Some(notify) = &config.notify {
        validate_notify_config(notify)?;
    }
    validate_jobs(&config.jobs)?;
    Ok(())
}

fn validate_runner_config(config: &RunnerConfig) -> Result<(), ConfigError> {
    if config.pool_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "pool-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.queue_poll_secs == 0 {
        return Err(ConfigError::Validation(
            "queue-poll-secs must be >= 1".to_string(),
        ));
    }

    if config.max_pages == 0 {
        return Err(ConfigError::Validation("max-pages must be >= 1".to_string()));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    validate_email(&config.from_email)?;

    Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid notify api-url: {}", e)))?;

    if config.recipients.is_empty() {
        return Err(ConfigError::Validation(
            "notify needs at least one recipient".to_string(),
        ));
    }

    for recipient in &config.recipients {
        validate_email(&recipient.email)?;
    }

    Ok(())
}

/// Validates job entries: names, targets, URLs, and that every rule builds
fn validate_jobs(jobs: &[JobEntry]) -> Result<(), ConfigError> {
    if jobs.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[job]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();

    for job in jobs {
        validate_job_name(&job.name)?;

        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate job name '{}'",
                job.name
            )));
        }

        if job.targets.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Job '{}' must have at least one target",
                job.name
            )));
        }

        for target in &job.targets {
            let url = Url::parse(&target.url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", target.url, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Target URL '{}' must use HTTP or HTTPS",
                    target.url
                )));
            }

            target
                .extraction
                .build()
                .map_err(|e| ConfigError::InvalidRule {
                    job: job.name.clone(),
                    message: e.to_string(),
                })?;

            if let Some(pagination) = &target.pagination {
                pagination.build().map_err(|e| ConfigError::InvalidRule {
                    job: job.name.clone(),
                    message: e.to_string(),
                })?;
            }
        }
    }

    Ok(())
}

/// Job names travel on the command line of worker processes
fn validate_job_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "job name cannot be empty".to_string(),
        ));
    }

    if name.starts_with('-') {
        return Err(ConfigError::Validation(format!(
            "job name '{}' cannot start with '-'",
            name
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "job name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            name
        )));
    }

    if name == crate::config::SELECT_ALL {
        return Err(ConfigError::Validation(format!(
            "'{}' is reserved and cannot be a job name",
            name
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "Invalid email address: '{}'",
            email
        ))),
    }
}
