//! Zip-Sweep: a postal-code driven listing crawler
//!
//! This crate resolves postal codes to the region tokens a property-listing
//! site uses for search, walks the paginated results for each region, extracts
//! every listing's detail page into a normalized record, and hands the records
//! to a persistence sink.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Zip-Sweep operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Every attempt against `target` failed transiently; the site is probably throttling us
    #[error("Request to {target} failed {attempts} times, it is probably blocked")]
    Blocked { target: String, attempts: u32 },

    /// The response was well-formed HTTP but did not have the structure we extract from
    #[error("Unexpected response structure from {target}: {message}")]
    Extraction { target: String, message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Returns true if this error should only skip the current unit of work
    ///
    /// Blocked and extraction failures are contained to a single postal code,
    /// page or listing. Everything else ends the run.
    pub fn is_contained(&self) -> bool {
        matches!(self, Self::Blocked { .. } | Self::Extraction { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Zip-Sweep operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ListingRecord, ListingReference, RegionDescriptor};
pub use state::{PageCursor, ZipcodeOutcome};
