//! Sumi-Linkrot main entry point
//!
//! This is the command-line interface for the Sumi-Linkrot link auditor.

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use sumi_linkrot::browser::{
    BrowserKind, DriverProcessReaper, NoopReaper, ProcessReaper, SessionFactory, WebDriverFactory,
};
use sumi_linkrot::config::{load_config_with_hash, Config};
use sumi_linkrot::crawler::{CrawlJob, LinkCheckService};
use sumi_linkrot::output::{load_statistics, print_statistics};
use sumi_linkrot::storage::{open_storage, SharedStorage};
use tracing_subscriber::EnvFilter;

/// Sumi-Linkrot: a depth-bounded link-rot auditor
///
/// Sumi-Linkrot crawls a site from a seed URL, checks every page and
/// embedded resource it finds within the depth limit, and records the
/// results per task in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sumi-linkrot")]
#[command(version = "1.0.0")]
#[command(about = "A depth-bounded link-rot auditor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed URL to crawl from
    #[arg(long, value_name = "URL", required_unless_present_any = ["check", "stats"])]
    url: Option<String>,

    /// Task name (defaults to the seed URL)
    #[arg(long)]
    name: Option<String>,

    /// Exclusion pattern (Ant-style glob, repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    excludes: Vec<String>,

    /// CSS selector whose matches are stored with each page result
    #[arg(long)]
    selector: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate a single URL and exit
    #[arg(long, value_name = "URL", conflicts_with_all = ["url", "stats"])]
    check: Option<String>,

    /// Show statistics for a task and exit
    #[arg(long, value_name = "TASK_ID", conflicts_with_all = ["url", "check"])]
    stats: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(task_id) = cli.stats {
        return handle_stats(&config, task_id);
    }

    if let Some(url) = cli.check.as_deref() {
        return handle_check(config, url).await;
    }

    let Some(seed) = cli.url.clone() else {
        bail!("--url is required to start a crawl");
    };
    handle_crawl(config, &config_hash, seed, cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_linkrot=info,warn"),
            1 => EnvFilter::new("sumi_linkrot=debug,info"),
            2 => EnvFilter::new("sumi_linkrot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_shared_storage(config: &Config) -> anyhow::Result<SharedStorage> {
    let path = Path::new(&config.output.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(Arc::new(Mutex::new(storage)))
}

/// Builds the rendering backend: a spawned driver if `driver-path` is set,
/// otherwise the configured WebDriver server
async fn session_backend(
    config: &Config,
) -> anyhow::Result<(Arc<dyn SessionFactory>, Arc<dyn ProcessReaper>)> {
    let kind: BrowserKind = config.browser.driver.parse()?;
    let headless = config.browser.headless;

    match &config.browser.driver_path {
        Some(path) => {
            let spawned = WebDriverFactory::spawn(path, headless)
                .await
                .with_context(|| format!("Failed to start driver {}", path))?;
            tracing::info!("Started {} driver at {}", kind, spawned.server_url());
            let factory: Arc<dyn SessionFactory> = Arc::new(spawned);
            let reaper: Arc<dyn ProcessReaper> = Arc::new(DriverProcessReaper::for_kind(kind));
            Ok((factory, reaper))
        }
        None => {
            let url = config.browser.webdriver_url.clone();
            let factory: Arc<dyn SessionFactory> = Arc::new(WebDriverFactory::connect(url, headless));
            let reaper: Arc<dyn ProcessReaper> = Arc::new(NoopReaper);
            Ok((factory, reaper))
        }
    }
}

/// Handles the --stats mode: shows statistics for one task
fn handle_stats(config: &Config, task_id: i64) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, task_id)
        .with_context(|| format!("Failed to load statistics for task {}", task_id))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --check mode: validates one URL with HEAD/GET retry
async fn handle_check(config: Config, url: &str) -> anyhow::Result<()> {
    let storage = open_shared_storage(&config)?;
    // Sessions are created lazily, so validation never touches the driver
    let factory = WebDriverFactory::connect(config.browser.webdriver_url.clone(), true);
    let service = LinkCheckService::new(config, storage, Arc::new(factory), Arc::new(NoopReaper))?;

    let result = service.validator()?.validate(url).await?;
    println!("URL: {}", result.url);
    println!("Valid: {}", result.valid);
    println!("Status: {}", result.status_code);
    if let Some(message) = &result.error_message {
        println!("Error: {}", message);
    }
    println!("Duration: {}ms", result.duration.as_millis());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    seed: String,
    cli: Cli,
) -> anyhow::Result<()> {
    let storage = open_shared_storage(&config)?;
    let (factory, reaper) = session_backend(&config).await?;
    let service = LinkCheckService::new(config, storage, factory, reaper)?;

    let name = cli.name.unwrap_or_else(|| seed.clone());
    let task_config = json!({
        "seedUrl": seed,
        "excludePatterns": cli.excludes,
        "selector": cli.selector,
        "maxDepth": service.config().crawler.max_depth,
        "configHash": config_hash,
    });
    let task_id = service.create_task(&name, &task_config)?;

    let job = CrawlJob::new(task_id, seed)
        .with_excludes(cli.excludes)
        .with_selector(cli.selector);
    let crawl = service.start_crawl(job).await;

    if let Err(e) = service.shutdown().await {
        tracing::warn!("Session pool shutdown failed: {}", e);
    }

    match crawl {
        Ok(Ok(counters)) => {
            println!(
                "Task {} finished: {} checked, {} invalid",
                task_id, counters.total, counters.invalid
            );
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
        Err(e) => bail!("Crawl task panicked: {}", e),
    }
}
