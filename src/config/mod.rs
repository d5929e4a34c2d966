//! Configuration module for Zip-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and collecting the postal codes a run should cover.
//!
//! # Example
//!
//! ```no_run
//! use zip_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("zip-sweep.toml")).unwrap();
//! println!("Search endpoint: {}", config.endpoints.search_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlMode, CrawlerConfig, EndpointConfig, OutputConfig, ZipcodeConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, dedup_preserving_order, load_config, load_config_with_hash,
    load_zipcodes, zipcodes_from_args,
};
