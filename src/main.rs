//! Ripple-Frontier main entry point
//!
//! This is the command-line interface for the Ripple-Frontier crawler.

use clap::Parser;
use ripple_frontier::config::{load_config_with_hash, Config};
use ripple_frontier::crawler::{Crawler, RunMode};
use ripple_frontier::output::{load_statistics, print_statistics};
use ripple_frontier::storage::open_store;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ripple-Frontier: a polite, incremental web crawler
///
/// Ripple-Frontier crawls websites while respecting robots.txt and crawl
/// delays. Documents are committed to a local SQLite database, and later
/// runs only recommit what changed.
#[derive(Parser, Debug)]
#[command(name = "ripple-frontier")]
#[command(version = "1.0.0")]
#[command(about = "A polite, incremental web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume the latest run even if it completed
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh run, keeping previous results for change detection
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the reference store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    fn run_mode(&self) -> RunMode {
        if self.fresh {
            RunMode::Fresh
        } else if self.resume {
            RunMode::Resume
        } else {
            RunMode::Auto
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.run_mode()).await?;
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
            0 => EnvFilter::new("ripple_frontier=info,warn"),
            1 => EnvFilter::new("ripple_frontier=debug,info"),
            2 => EnvFilter::new("ripple_frontier=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Ripple-Frontier Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  ID: {}", crawler.id);
    println!("  Work directory: {}", crawler.work_dir.display());
    println!("  Workers: {}", crawler.num_threads);
    println!("  Max depth: {}", limit(crawler.max_depth.into()));
    println!("  Max URLs: {}", limit(crawler.max_urls));
    println!("  Orphans strategy: {:?}", crawler.orphans_strategy);
    println!("  Robots.txt: {}", enabled(!crawler.ignore_robots_txt));
    println!("  Robots meta: {}", enabled(!crawler.ignore_robots_meta));
    println!("  Sitemaps: {}", enabled(!crawler.ignore_sitemap));
    println!("  Keep downloads: {}", enabled(crawler.keep_downloads));

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nDelay:");
    println!(
        "  {}ms per {:?}{}",
        config.delay.default_delay,
        config.delay.scope,
        if config.delay.ignore_robots_crawl_delay {
            ", robots.txt Crawl-delay ignored"
        } else {
            ""
        }
    );

    println!(
        "\nFilters: {} URL, {} header, {} document",
        config.url_filters.len(),
        config.header_filters.len(),
        config.document_filters.len()
    );

    println!("\nStart URLs ({}):", crawler.start_urls.len());
    for url in &crawler.start_urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

fn limit(value: i64) -> String {
    if value < 0 {
        "unlimited".to_string()
    } else {
        value.to_string()
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Handles the --stats mode: shows statistics from the reference store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.crawler.store_path();
    println!("Reference store: {}\n", path.display());

    let store = open_store(&path)?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, mode: RunMode) -> anyhow::Result<()> {
    match mode {
        RunMode::Fresh => tracing::info!("Starting fresh crawl"),
        RunMode::Resume => tracing::info!("Resuming the latest run"),
        RunMode::Auto => tracing::info!("Starting crawl (will resume if an unfinished run exists)"),
    }
    tracing::info!("Start URLs: {}", config.crawler.start_urls.len());

    let crawler = Crawler::builder(config).config_hash(config_hash).build()?;

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    // Run the crawler
    match crawler.run(mode).await {
        Ok(summary) => {
            if summary.stopped {
                tracing::info!("Crawl stopped, run {} can be resumed", summary.run_id);
            } else {
                tracing::info!("Crawl completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
