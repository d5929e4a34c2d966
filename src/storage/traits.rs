//! Storage traits and error types
//!
//! This module defines the sink the crawler writes records into and the
//! run bookkeeping built on top of it.

use crate::crawler::ListingRecord;
use crate::state::ZipcodeOutcome;
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for finished listing records
///
/// Records arrive one at a time and only once fully extracted. A failing
/// sink ends the crawl.
pub trait ListingSink {
    /// Persists a record
    ///
    /// Returns false if a listing with the same id was already stored; the
    /// existing row is left unchanged.
    fn store_listing(&mut self, record: &ListingRecord) -> StorageResult<bool>;

    /// Checks if a listing id has been stored before
    fn contains_listing(&self, listing_id: &str) -> StorageResult<bool>;
}

/// Listing sink with crawl run bookkeeping
pub trait Storage: ListingSink {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Postal Codes =====

    /// Records how a postal code ended within a run
    ///
    /// Recording the same postal code twice for a run replaces the first entry.
    fn record_zipcode(
        &mut self,
        run_id: i64,
        zipcode: &str,
        outcome: ZipcodeOutcome,
        records: u64,
    ) -> StorageResult<()>;

    // ===== Statistics =====

    /// Gets total listing count
    fn count_listings(&self) -> StorageResult<u64>;

    /// Counts postal codes of a run with the given outcome
    fn count_zipcodes_by_outcome(&self, run_id: i64, outcome: ZipcodeOutcome)
        -> StorageResult<u64>;

    /// Gets postal codes of a run with the given outcome, in the order they were recorded
    fn get_zipcodes_by_outcome(
        &self,
        run_id: i64,
        outcome: ZipcodeOutcome,
    ) -> StorageResult<Vec<String>>;
}
