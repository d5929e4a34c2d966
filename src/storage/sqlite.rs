//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::ListingRecord;
use crate::state::ZipcodeOutcome;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingSink, Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Loads a stored listing back into a record
    pub fn get_listing(&self, listing_id: &str) -> StorageResult<Option<ListingRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT listing_id, lat, lon, description, feature_json, captured_on
                 FROM listings WHERE listing_id = ?1",
                params![listing_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, chrono::NaiveDate>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, lat, lon, description, feature_json, captured_on)) = row else {
            return Ok(None);
        };

        Ok(Some(ListingRecord {
            id,
            lat,
            lon,
            description,
            features: serde_json::from_str(&feature_json)?,
            captured_on,
        }))
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

impl ListingSink for SqliteStorage {
    fn store_listing(&mut self, record: &ListingRecord) -> StorageResult<bool> {
        let feature_json = serde_json::to_string(&record.features)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO listings (listing_id, lat, lon, description, feature_json, captured_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.lat,
                record.lon,
                record.description,
                feature_json,
                record.captured_on
            ],
        )?;
        Ok(inserted > 0)
    }

    fn contains_listing(&self, listing_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM listings WHERE listing_id = ?1",
                params![listing_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Postal Codes =====

    fn record_zipcode(
        &mut self,
        run_id: i64,
        zipcode: &str,
        outcome: ZipcodeOutcome,
        records: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO zipcode_results (run_id, zipcode, outcome, records, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(run_id, zipcode) DO UPDATE SET
                outcome = excluded.outcome,
                records = excluded.records,
                recorded_at = excluded.recorded_at",
            params![run_id, zipcode, outcome.to_db_string(), records as i64, now],
        )?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_zipcodes_by_outcome(
        &self,
        run_id: i64,
        outcome: ZipcodeOutcome,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM zipcode_results WHERE run_id = ?1 AND outcome = ?2",
            params![run_id, outcome.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_zipcodes_by_outcome(
        &self,
        run_id: i64,
        outcome: ZipcodeOutcome,
    ) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT zipcode FROM zipcode_results WHERE run_id = ?1 AND outcome = ?2 ORDER BY id",
        )?;

        let zipcodes = stmt
            .query_map(params![run_id, outcome.to_db_string()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(zipcodes)
    }
}
