//! Vessel main entry point
//!
//! This is the command-line interface for the Vessel page scheduler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vessel::config::{load_config_with_hash, Config};
use vessel::output::{print_statistics, RunStatistics};
use vessel::{HttpEngine, HttpPage, NavigationResult, Request, Scheduler, TaskStatus};

/// Vessel: a bounded-concurrency page scheduler
///
/// Vessel loads every URL given on the command line on a pool of worker
/// threads and reports the outcome of each navigation.
#[derive(Parser, Debug)]
#[command(name = "vessel")]
#[command(version)]
#[command(about = "A bounded-concurrency page scheduler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to load
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// URLs to pass through as stubs (reported, never loaded)
    #[arg(long = "stub", value_name = "URL")]
    stubs: Vec<String>,

    /// Print the links found on each loaded page
    #[arg(long)]
    links: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be loaded without loading anything
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let requests = build_requests(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config, &requests);
        return Ok(());
    }

    handle_run(&config, requests, cli.links)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("vessel=info,warn"),
            1 => EnvFilter::new("vessel=debug,info"),
            2 => EnvFilter::new("vessel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(verbose > 0)
        .with_file(false)
        .init();
}

fn build_requests(cli: &Cli) -> anyhow::Result<Vec<Request>> {
    let mut requests = Vec::with_capacity(cli.urls.len() + cli.stubs.len());

    for url in &cli.urls {
        requests.push(Request::parse(url).with_context(|| format!("invalid URL '{}'", url))?);
    }

    for url in &cli.stubs {
        let url = url::Url::parse(url).with_context(|| format!("invalid stub URL '{}'", url))?;
        requests.push(Request::stub(url));
    }

    Ok(requests)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, requests: &[Request]) {
    println!("=== Vessel Dry Run ===\n");

    println!("Scheduler:");
    println!("  Min threads: {}", config.scheduler.min_threads);
    println!("  Max threads: {}", config.scheduler.max_threads);
    if config.scheduler.delay > 0.0 && config.scheduler.max_threads > 1 {
        println!(
            "  Delay: {}s (ignored, pacing requires max-threads = 1)",
            config.scheduler.delay
        );
    } else {
        println!("  Delay: {}s", config.scheduler.delay);
    }
    match config.scheduler.timeout {
        Some(timeout) => println!("  Timeout: {}s", timeout),
        None => println!("  Timeout: none"),
    }
    println!("  Shutdown grace period: {}s", config.scheduler.shutdown_timeout);
    if let Some(headers) = &config.scheduler.headers {
        println!("  Headers:");
        for (name, value) in headers {
            println!("    {}: {}", name, value);
        }
    }

    println!("\nEngine:");
    println!("  User agent: {}", config.engine.user_agent);
    println!("  Max redirects: {}", config.engine.max_redirects);
    for (key, value) in &config.engine.extra {
        println!("  {}: {}", key, value);
    }

    println!("\nRequests ({}):", requests.len());
    for request in requests {
        println!("  - {}", request);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main run: posts every request and reports the results
fn handle_run(config: &Config, requests: Vec<Request>, show_links: bool) -> anyhow::Result<()> {
    let scheduler_config = config.scheduler_config()?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<NavigationResult<HttpPage>>();

    let scheduler: Scheduler<HttpEngine, _> =
        Scheduler::new(tx, scheduler_config).context("failed to start scheduler")?;

    let started = Instant::now();
    let expected = requests.len();
    let handles = scheduler.post(requests)?;
    tracing::info!("Posted {} requests", expected);

    let mut stats = RunStatistics::new();
    for _ in 0..expected {
        let Some(result) = rx.blocking_recv() else {
            break;
        };
        report(&result, show_links);
        stats.record(&result);
        if let Some(status) = result.page.as_ref().and_then(HttpPage::status) {
            stats.record_status(status);
        }
    }

    let panicked = handles
        .into_iter()
        .map(|handle| handle.wait())
        .filter(|status| *status == TaskStatus::Panicked)
        .count();
    if panicked > 0 {
        tracing::error!("{} tasks panicked", panicked);
    }

    stats.elapsed = Some(started.elapsed());
    if let Some(report) = scheduler.stop() {
        if !report.graceful {
            tracing::warn!("Scheduler shut down forcibly");
        }
    }

    println!();
    print_statistics(&stats);

    Ok(())
}

fn report(result: &NavigationResult<HttpPage>, show_links: bool) {
    if let Some(error) = result.error() {
        println!("✗ {}: {}", result.request, error);
        return;
    }

    let Some(page) = &result.page else {
        println!("- {}", result.request);
        return;
    };

    let status = page
        .status()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    match page.title() {
        Some(title) => println!("✓ {} [{}] {}", result.request, status, title),
        None => println!("✓ {} [{}]", result.request, status),
    }

    if show_links {
        for link in page.links() {
            println!("    → {}", link);
        }
    }
}
