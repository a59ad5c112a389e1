//! Satchel main entry point
//!
//! This is the command-line interface for the Satchel artifact crawler.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use satchel::config::{load_config_with_hash, Config};
use satchel::crawler::{crawl, CrawlMode};
use satchel::report::summary::write_markdown_summary;
use satchel::report::CrawlReport;
use satchel::session::SessionStore;
use satchel::storage::SqliteKv;
use satchel::{CompletionStatus, SatchelError};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Satchel: a resumable course-artifact crawler
///
/// Satchel walks one course site, collects the PDF artifacts it links to,
/// and persists its progress after every page so an interrupted crawl can
/// pick up exactly where it left off.
#[derive(Parser, Debug)]
#[command(name = "satchel")]
#[command(version)]
#[command(about = "A resumable course-artifact crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "satchel.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Refuse to start unless an interrupted crawl can be resumed
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, discarding previous state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "reset"])]
    dry_run: bool,

    /// Show the stored session's progress and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "reset"])]
    stats: bool,

    /// Generate the markdown summary from the stored session and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "reset"])]
    export_summary: bool,

    /// Delete the stored session and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config).await?;
    } else if cli.export_summary {
        handle_export_summary(&config).await?;
    } else if cli.reset {
        handle_reset(&config).await?;
    } else {
        let mode = if cli.fresh {
            CrawlMode::Fresh
        } else if cli.resume {
            CrawlMode::Resume
        } else {
            CrawlMode::Auto
        };
        handle_crawl(config, config_hash, mode).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("satchel=info,warn"),
            1 => EnvFilter::new("satchel=debug,info"),
            2 => EnvFilter::new("satchel=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use satchel::CrawlScope;

    println!("=== Satchel Dry Run ===\n");

    println!("Root:");
    println!("  Id: {}", config.root.root_id);
    println!("  Base URL: {}", config.root.base_url);

    let scope = CrawlScope::new(&config.root.base_url, &config.root.root_id)?;
    println!("\nEntry Points ({}):", config.root.entry_points.len());
    for entry in &config.root.entry_points {
        let url = scope.entry_target(&entry.path)?;
        println!(
            "  - {} (priority {}, phase {})",
            url, entry.priority, entry.phase
        );
    }

    println!("\nCrawler Configuration:");
    println!(
        "  Max navigation attempts: {}",
        config.crawler.max_navigation_attempts
    );
    println!("  Max retries: {}", config.crawler.max_retries);
    println!(
        "  Navigation timeout: {}ms",
        config.crawler.navigation_timeout_ms
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!(
        "  Resolver concurrency: {}",
        config.crawler.resolver_concurrency
    );
    println!(
        "  Politeness delay: {}ms",
        config.crawler.politeness_delay_ms
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.name);
    println!("  Version: {}", config.user_agent.version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling from {} entry point(s)",
        config.root.entry_points.len()
    );

    Ok(())
}

/// Opens the configured store and loads the session it holds
///
/// A session stored for a different root is reported, not silently shown.
async fn load_stored_session(
    config: &Config,
) -> Result<satchel::CrawlSession, Box<dyn std::error::Error>> {
    let backend = Arc::new(SqliteKv::open(Path::new(&config.output.database_path))?);
    let store = SessionStore::new(backend, &config.root.root_id);

    match store.peek().await? {
        None => Err(SatchelError::NoSession {
            root: config.root.root_id.clone(),
        }
        .into()),
        Some(session) if session.root_id != config.root.root_id => {
            Err(SatchelError::StaleSession {
                expected: config.root.root_id.clone(),
                found: session.root_id,
            }
            .into())
        }
        Some(session) => Ok(session),
    }
}

/// Handles the --stats mode: shows the stored session's progress
async fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let session = load_stored_session(config).await?;
    let stats = session.queue.stats();

    println!("Session: {}", session.session_id);
    println!("Root: {}", session.root_id);
    println!("Status: {}", session.completion);
    println!("Started: {}", session.started_at.to_rfc3339());
    println!();
    println!("Pages visited: {}", session.counters.pages_visited);
    println!(
        "Navigation attempts: {} / {}",
        session.counters.navigation_attempts, session.limits.max_navigation_attempts
    );
    println!(
        "Retries used: {} / {}",
        session.counters.retries, session.limits.max_retries
    );
    println!(
        "Queue: {} / {} done ({:.0}%)",
        stats.visited, stats.total, stats.progress_pct
    );
    println!("Artifacts: {}", session.artifacts.len());
    println!("Failed targets: {}", session.failed_targets.len());

    Ok(())
}

/// Handles the --export-summary mode: generates the markdown summary
async fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let session = load_stored_session(config).await?;

    tracing::info!("Generating markdown summary...");
    let report = CrawlReport::from_session(&session);
    write_markdown_summary(&report, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the --reset mode: deletes the stored session
async fn handle_reset(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = Arc::new(SqliteKv::open(Path::new(&config.output.database_path))?);
    let store = SessionStore::new(backend, &config.root.root_id);
    store.clear().await?;

    println!("✓ Stored session cleared from: {}", config.output.database_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    mode: CrawlMode,
) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        CrawlMode::Fresh => tracing::info!("Starting fresh crawl (discarding previous state)"),
        CrawlMode::Resume => tracing::info!("Resuming interrupted crawl"),
        CrawlMode::Auto => {
            tracing::info!("Starting crawl (will resume if interrupted run exists)")
        }
    }

    // Ctrl-C flips the stop signal; the navigator finishes the page it is
    // on, persists the session, and exits as Stopped.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current page");
            let _ = stop_tx.send(true);
        }
    });

    let report = match crawl(&config, &config_hash, mode, stop_rx).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    write_markdown_summary(&report, Path::new(&config.output.summary_path))?;
    tracing::info!("Summary written to: {}", config.output.summary_path);

    match report.completion {
        CompletionStatus::Completed => {
            tracing::info!(
                "Crawl completed: {} artifact(s) across {} page(s)",
                report.artifacts.len(),
                report.pages_visited
            );
            Ok(())
        }
        CompletionStatus::Failed => {
            tracing::error!(
                "Crawl failed after {} navigation failure(s)",
                report.failed_targets.len()
            );
            Err(SatchelError::RetryBudgetExhausted {
                retries: report.failed_targets.len() as u32,
            }
            .into())
        }
        _ => {
            tracing::info!(
                "Crawl suspended with {} artifact(s) so far; run again to resume",
                report.artifacts.len()
            );
            Ok(())
        }
    }
}
