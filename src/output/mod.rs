//! Output module for crawl reports
//!
//! This module handles:
//! - The end-of-crawl report built while the crawl runs
//! - Aggregate statistics loaded back from the database

mod report;
mod stats;

pub use report::{print_report, CrawlReport, ZipcodeSummary};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
