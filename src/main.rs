//! Pagetally main entry point
//!
//! This is the command-line interface for the Pagetally page-count crawler.

use clap::Parser;
use pagetally::config::{load_config_with_hash, Config, JobEntry};
use pagetally::engine::Engine;
use pagetally::fetch::HttpFetcher;
use pagetally::job::{Job, Lifecycle};
use pagetally::notify::{MailjetNotifier, Notifier};
use pagetally::report::{ConsoleReporter, MultiReporter, ResultReporter, SqliteReporter};
use pagetally::scheduler::{run_cooperative, run_supervised, Pool, ProcessRunner, RunSummary, WorkItem};
use pagetally::supervisor::{serve_attempt, ProcessLauncher, Supervisor};
use pagetally::TallyError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Pagetally: a resilient page-count crawler
///
/// Pagetally runs crawl jobs that count items (vacancies, products, ...)
/// across paginated listings, retrying failed jobs in fresh worker processes
/// and optionally spreading jobs over a pool of processes.
#[derive(Parser, Debug)]
#[command(name = "pagetally")]
#[command(version)]
#[command(about = "A resilient page-count crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Jobs to run: job names, group tags, or `all`
    #[arg(value_name = "JOBS", required = true)]
    jobs: Vec<String>,

    /// Run jobs in a pool of K worker processes
    #[arg(short = 's', long, value_name = "K", value_parser = clap::value_parser!(u32).range(1..))]
    super_parallel: Option<u32>,

    /// Run each job in isolated workers, with up to N attempts
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    retry: Option<u32>,

    /// Email the latest results after the run
    #[arg(short, long)]
    email: bool,

    /// Log file name without extension (default: start date and time)
    #[arg(short, long, value_name = "NAME")]
    log: Option<String>,

    /// Directory for log files
    #[arg(long, value_name = "DIR", default_value = "log")]
    log_dir: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show which jobs would run without running them
    #[arg(long)]
    dry_run: bool,

    /// Run one attempt of a single job and stream its errors on stdout
    #[arg(long, hide = true, conflicts_with_all = ["super_parallel", "retry", "email", "dry_run"])]
    isolated_worker: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_name = cli.log.clone().unwrap_or_else(default_log_name);
    let _guard = setup_logging(&cli, &log_name);

    // Load and validate configuration
    tracing::debug!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::debug!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.isolated_worker {
        return handle_isolated_worker(&config, &cli).await;
    }

    let selected = config.select_jobs(&cli.jobs);
    if selected.is_empty() {
        return Err(TallyError::NoJobsSelected.into());
    }

    if cli.dry_run {
        handle_dry_run(&config, &selected, &cli, &log_name)?;
        return Ok(());
    }

    let summary = if let Some(workers) = cli.super_parallel {
        handle_pool(&config, &selected, &cli, &log_name, workers).await?
    } else if let Some(trials) = cli.retry {
        handle_supervised(&config, &selected, &cli, &log_name, trials).await?
    } else {
        handle_cooperative(&config, &selected).await?
    };

    summary.log();

    if cli.email {
        send_email(&config).await;
    }

    summary.into_result()?;
    Ok(())
}

/// Log file name used when `--log` is not given
fn default_log_name() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Sets up the console and log-file subscribers
///
/// Isolated workers log to stderr because stdout carries their error channel.
/// Every process of one run appends to the same `<log-dir>/<name>.log`.
fn setup_logging(cli: &Cli, log_name: &str) -> Option<WorkerGuard> {
    let filter = if cli.quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match cli.verbose {
            0 => EnvFilter::new("pagetally=info,warn"),
            1 => EnvFilter::new("pagetally=debug,info"),
            2 => EnvFilter::new("pagetally=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let writer = if cli.isolated_worker {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let file = std::fs::create_dir_all(&cli.log_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(log_name)
                .filename_suffix("log")
                .build(&cli.log_dir)
                .map_err(|e| e.to_string())
        });

    let (file_layer, guard) = match file {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Cannot open log file in {}: {}",
                cli.log_dir.display(),
                e
            );
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

/// Builds the engine from the runner and user agent settings
fn build_engine(config: &Config) -> Result<Engine, TallyError> {
    let fetcher = HttpFetcher::from_config(
        &config.user_agent,
        Duration::from_secs(config.runner.request_timeout_secs),
    )?;
    Ok(Engine::new(Arc::new(fetcher)).with_max_pages(config.runner.max_pages))
}

/// Builds the reporter that receives each final job result
fn build_reporter(config: &Config) -> Result<Arc<dyn ResultReporter>, TallyError> {
    let mut reporter = MultiReporter::new();
    if config.output.console {
        reporter = reporter.with(Arc::new(ConsoleReporter::new()));
    }
    let sqlite = SqliteReporter::new(Path::new(&config.output.database_path))?;
    reporter = reporter.with(Arc::new(sqlite));
    Ok(Arc::new(reporter))
}

/// Handles the hidden --isolated-worker mode: one attempt of one job
async fn handle_isolated_worker(config: &Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let name = cli.jobs.first().cloned().unwrap_or_default();
    let entry = config
        .job(&name)
        .ok_or_else(|| TallyError::UnknownJob(name.clone()))?;

    let engine = build_engine(config)?;
    let mut stdout = tokio::io::stdout();

    if serve_attempt(engine, entry, &mut stdout).await? {
        Ok(())
    } else {
        Err(TallyError::JobsFailed(vec![name]).into())
    }
}

/// Handles the default mode: all jobs cooperatively on one task
async fn handle_cooperative(config: &Config, selected: &[&JobEntry]) -> Result<RunSummary, TallyError> {
    let jobs = selected
        .iter()
        .map(|entry| Job::from_entry(entry))
        .collect::<Result<Vec<_>, _>>()?;

    let lifecycle = Lifecycle::new(build_engine(config)?, build_reporter(config)?);
    Ok(run_cooperative(jobs, &lifecycle).await)
}

/// Handles --retry without --super-parallel: jobs one by one under the supervisor
async fn handle_supervised(
    config: &Config,
    selected: &[&JobEntry],
    cli: &Cli,
    log_name: &str,
    trials: u32,
) -> Result<RunSummary, TallyError> {
    let launcher = ProcessLauncher::current_exe(&cli.config)?
        .with_log(&cli.log_dir, log_name)
        .with_verbosity(cli.verbose, cli.quiet);
    let supervisor = Supervisor::new(Arc::new(launcher), build_reporter(config)?);

    Ok(run_supervised(selected, &supervisor, trials).await)
}

/// Handles --super-parallel: a pool of processes draining the job queue
async fn handle_pool(
    config: &Config,
    selected: &[&JobEntry],
    cli: &Cli,
    log_name: &str,
    workers: u32,
) -> Result<RunSummary, TallyError> {
    let items = work_items(selected, cli, log_name);
    let runner = Arc::new(ProcessRunner::current_exe()?);
    let pool = Pool::new(runner, build_reporter(config)?, workers as usize)
        .with_item_timeout(Duration::from_secs(config.runner.pool_timeout_secs))
        .with_poll_interval(Duration::from_secs(config.runner.queue_poll_secs));

    Ok(pool.run(items).await)
}

fn work_items(selected: &[&JobEntry], cli: &Cli, log_name: &str) -> Vec<WorkItem> {
    selected
        .iter()
        .map(|entry| WorkItem {
            config: cli.config.clone(),
            job: entry.name.clone(),
            label: Some(entry.label().to_string()),
            retry: cli.retry,
            log_dir: Some(cli.log_dir.clone()),
            log_name: Some(log_name.to_string()),
            verbose: cli.verbose,
            quiet: cli.quiet,
        })
        .collect()
}

/// Handles the --email option: mails the latest stored result of every job
async fn send_email(config: &Config) {
    tracing::info!("Going to send an email");

    let sent = async {
        let reports = SqliteReporter::new(Path::new(&config.output.database_path))?.latest_reports()?;
        let notifier = MailjetNotifier::from_env(config.notify.as_ref())?;
        notifier.notify(&reports).await?;
        Ok::<(), TallyError>(())
    }
    .await;

    if let Err(e) = sent {
        tracing::error!("Failed to send email: {}", e);
    }
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(
    config: &Config,
    selected: &[&JobEntry],
    cli: &Cli,
    log_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Pagetally Dry Run ===\n");

    println!("Runner:");
    println!("  Max pages per target: {}", config.runner.max_pages);
    println!("  Request timeout: {}s", config.runner.request_timeout_secs);
    println!("  Pool item timeout: {}s", config.runner.pool_timeout_secs);
    println!("  Queue poll: {}s", config.runner.queue_poll_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Log file: {}", cli.log_dir.join(format!("{}.log", log_name)).display());

    let mode = match (cli.super_parallel, cli.retry) {
        (Some(k), Some(n)) => format!("pool of {} workers, {} trials per job", k, n),
        (Some(k), None) => format!("pool of {} workers", k),
        (None, Some(n)) => format!("supervised, {} trials per job", n),
        (None, None) => "cooperative".to_string(),
    };
    println!("\nMode: {}", mode);

    println!("\nSelected jobs ({}):", selected.len());
    for entry in selected {
        println!("  - {} ({}, {} targets)", entry.name, entry.label(), entry.targets.len());
        for target in &entry.targets {
            println!("    * {}", target.url);
        }
    }

    if cli.super_parallel.is_some() {
        println!("\nWork items:");
        for item in work_items(selected, cli, log_name) {
            println!("  {}", serde_json::to_string(&item)?);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would run {} of {} configured jobs", selected.len(), config.jobs.len());

    Ok(())
}
