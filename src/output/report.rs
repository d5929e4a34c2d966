//! End-of-crawl report
//!
//! The coordinator owns the report and is its only writer: worker results are
//! folded in on the coordinator task after each join.

use crate::state::ZipcodeOutcome;
use std::time::Duration;

/// What happened to one postal code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipcodeSummary {
    pub zipcode: String,
    pub outcome: ZipcodeOutcome,
    pub records: u64,
}

/// Aggregate counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub run_id: i64,

    /// Postal codes in the order they were crawled
    pub zipcodes: Vec<ZipcodeSummary>,

    /// Records accepted by the sink
    pub records_stored: u64,

    /// Listings whose detail page yielded nothing
    pub listings_skipped: u64,

    /// Listings not fetched because they were already stored
    pub known_skipped: u64,

    /// Records the sink refused as already present
    pub duplicates_skipped: u64,

    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn new(run_id: i64) -> Self {
        Self {
            run_id,
            ..Self::default()
        }
    }

    pub fn record_zipcode(&mut self, zipcode: &str, outcome: ZipcodeOutcome, records: u64) {
        self.zipcodes.push(ZipcodeSummary {
            zipcode: zipcode.to_string(),
            outcome,
            records,
        });
    }

    /// Postal codes that ended with `outcome`, in crawl order
    pub fn zipcodes_with(&self, outcome: ZipcodeOutcome) -> Vec<&str> {
        self.zipcodes
            .iter()
            .filter(|z| z.outcome == outcome)
            .map(|z| z.zipcode.as_str())
            .collect()
    }

    pub fn count(&self, outcome: ZipcodeOutcome) -> usize {
        self.zipcodes.iter().filter(|z| z.outcome == outcome).count()
    }

    /// Postal codes that yielded at least one record vs. none
    pub fn populated_vs_not(&self) -> (usize, usize) {
        let populated = self.count(ZipcodeOutcome::Populated);
        (populated, self.zipcodes.len() - populated)
    }
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    let (populated, not_populated) = report.populated_vs_not();

    println!("=== Crawl Run {} ===\n", report.run_id);
    println!("Postal codes crawled: {}", report.zipcodes.len());
    println!("  with listings: {}", populated);
    println!("  without listings: {}", not_populated);
    for outcome in ZipcodeOutcome::all() {
        println!("    {}: {}", outcome, report.count(outcome));
    }
    println!();

    println!("Listings:");
    println!("  Stored: {}", report.records_stored);
    println!("  Skipped (no usable detail): {}", report.listings_skipped);
    println!("  Skipped (already stored): {}", report.known_skipped);
    println!("  Duplicates: {}", report.duplicates_skipped);
    println!();

    let mut with_listings = report
        .zipcodes
        .iter()
        .filter(|z| z.outcome.is_populated())
        .peekable();
    if with_listings.peek().is_some() {
        println!("Postal codes with listings:");
        for summary in with_listings {
            println!("  - {} ({} new records)", summary.zipcode, summary.records);
        }
        println!();
    }

    let blocked = report.zipcodes_with(ZipcodeOutcome::Blocked);
    if !blocked.is_empty() {
        println!("Blocked postal codes: {}", blocked.join(", "));
        println!();
    }

    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
}
