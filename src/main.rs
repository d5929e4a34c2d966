//! Zip-Sweep main entry point
//!
//! This is the command-line interface for the Zip-Sweep listing crawler.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use zip_sweep::config::{load_config_with_hash, load_zipcodes, zipcodes_from_args, Config, CrawlMode};
use zip_sweep::crawler::run_crawl;
use zip_sweep::output::{load_statistics, print_report, print_statistics};
use zip_sweep::storage::SqliteStorage;

/// Zip-Sweep: a postal-code driven listing crawler
///
/// Zip-Sweep resolves each postal code to a search region, walks the paginated
/// results for it, extracts every listing's detail page and stores the
/// records in SQLite.
#[derive(Parser, Debug)]
#[command(name = "zip-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A postal-code driven listing crawler", long_about = None)]
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

    /// Crawl only these postal codes instead of the configured ones
    #[arg(short, long = "zipcode", value_name = "CODE")]
    zipcodes: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Run to show with --stats (defaults to the latest run)
    #[arg(long, value_name = "ID", requires = "stats")]
    run: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config, cli.run);
    }

    let zipcodes = if cli.zipcodes.is_empty() {
        let base_dir = cli.config.parent().unwrap_or_else(|| Path::new("."));
        load_zipcodes(&config, base_dir).context("Failed to load postal codes")?
    } else {
        zipcodes_from_args(&cli.zipcodes)?
    };

    if cli.dry_run {
        handle_dry_run(&config, &zipcodes);
        return Ok(());
    }

    handle_crawl(config, &config_hash, &zipcodes).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("zip_sweep=info,warn"),
            1 => EnvFilter::new("zip_sweep=debug,info"),
            2 => EnvFilter::new("zip_sweep=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration and postal codes
fn handle_dry_run(config: &Config, zipcodes: &[String]) {
    println!("=== Zip-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Mode: {}",
        match config.crawler.mode {
            CrawlMode::Detail => "detail",
            CrawlMode::Pins => "pins",
        }
    );
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!(
        "  Delay: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Detail workers: {}", config.crawler.detail_workers);
    println!("  Skip known listings: {}", config.crawler.skip_known_listings);

    println!("\nEndpoints:");
    println!("  Geography: {}", config.endpoints.geography_url);
    println!("  Search: {}", config.endpoints.search_url);
    println!("  Listing selector: {}", config.endpoints.listing_selector);

    println!("\nHeaders ({}):", config.headers.len());
    for name in config.headers.keys() {
        println!("  - {}", name);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nPostal Codes ({}):", zipcodes.len());
    for zipcode in zipcodes {
        println!("  - {}", zipcode);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} postal codes", zipcodes.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, run_id: Option<i64>) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    match load_statistics(&storage, run_id)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs found in database"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, zipcodes: &[String]) -> Result<()> {
    if zipcodes.is_empty() {
        tracing::warn!("No postal codes to crawl");
        return Ok(());
    }

    tracing::info!(
        "Crawling {} postal codes into {}",
        zipcodes.len(),
        config.output.database_path
    );

    let report = run_crawl(config, config_hash, zipcodes)
        .await
        .context("Crawl failed")?;

    print_report(&report);

    Ok(())
}
