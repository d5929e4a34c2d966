//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::ZipcodeOutcome;
use crate::storage::{RunRecord, Storage, StorageError};

/// Crawl statistics summary for one run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run: RunRecord,

    /// Total number of listings in the database, across all runs
    pub total_listings: u64,

    /// Count of postal codes by outcome, in reporting order
    pub zipcodes_by_outcome: Vec<(ZipcodeOutcome, u64)>,

    /// Postal codes that produced listings
    pub populated_zipcodes: Vec<String>,

    /// Postal codes that were blocked
    pub blocked_zipcodes: Vec<String>,
}

impl CrawlStatistics {
    pub fn total_zipcodes(&self) -> u64 {
        self.zipcodes_by_outcome.iter().map(|(_, count)| count).sum()
    }
}

/// Loads statistics for one run, or the most recent run if `run_id` is `None`
///
/// # Returns
///
/// * `Ok(Some(CrawlStatistics))` - Successfully loaded statistics
/// * `Ok(None)` - No run was asked for and the database has no runs yet
/// * `Err(StorageError::RunNotFound)` - The requested run does not exist
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    run_id: Option<i64>,
) -> Result<Option<CrawlStatistics>, StorageError> {
    let run = match run_id {
        Some(id) => storage.get_run(id)?,
        None => match storage.get_latest_run()? {
            Some(run) => run,
            None => return Ok(None),
        },
    };

    let mut zipcodes_by_outcome = Vec::new();
    for outcome in ZipcodeOutcome::all() {
        zipcodes_by_outcome.push((outcome, storage.count_zipcodes_by_outcome(run.id, outcome)?));
    }

    Ok(Some(CrawlStatistics {
        total_listings: storage.count_listings()?,
        zipcodes_by_outcome,
        populated_zipcodes: storage.get_zipcodes_by_outcome(run.id, ZipcodeOutcome::Populated)?,
        blocked_zipcodes: storage.get_zipcodes_by_outcome(run.id, ZipcodeOutcome::Blocked)?,
        run,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run:");
    println!("  Run ID: {}", stats.run.id);
    println!("  Status: {}", stats.run.status);
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", stats.run.config_hash);
    println!();

    println!("Listings stored (all runs): {}", stats.total_listings);
    println!();

    let total = stats.total_zipcodes();
    println!("Postal codes by outcome:");
    for (outcome, count) in &stats.zipcodes_by_outcome {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", outcome, count, percentage);
    }
    println!();

    if !stats.populated_zipcodes.is_empty() {
        println!("Postal codes with listings ({}):", stats.populated_zipcodes.len());
        for zipcode in &stats.populated_zipcodes {
            println!("  - {}", zipcode);
        }
        println!();
    }

    if !stats.blocked_zipcodes.is_empty() {
        println!("Blocked postal codes ({}):", stats.blocked_zipcodes.len());
        for zipcode in &stats.blocked_zipcodes {
            println!("  - {}", zipcode);
        }
    }
}
