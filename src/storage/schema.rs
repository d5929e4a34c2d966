//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Zip-Sweep database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Extracted listings, one row per listing id
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id TEXT NOT NULL UNIQUE,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    description TEXT NOT NULL,
    feature_json TEXT NOT NULL,
    captured_on TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_captured_on ON listings(captured_on);

-- How each postal code ended within a run
CREATE TABLE IF NOT EXISTS zipcode_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    zipcode TEXT NOT NULL,
    outcome TEXT NOT NULL,
    records INTEGER NOT NULL DEFAULT 0,
    recorded_at TEXT NOT NULL,
    UNIQUE(run_id, zipcode)
);

CREATE INDEX IF NOT EXISTS idx_zipcode_results_outcome ON zipcode_results(run_id, outcome);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
