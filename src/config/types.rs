use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Zip-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub output: OutputConfig,
    #[serde(default)]
    pub zipcodes: ZipcodeConfig,
}

/// How listings are enumerated for a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Walk the paginated results and fetch every listing's detail page
    #[default]
    Detail,

    /// Read the map pins only; records carry coordinates but no detail
    Pins,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Attempts per network operation before giving up as blocked
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of detail pages fetched concurrently
    #[serde(rename = "detail-workers", default = "default_detail_workers")]
    pub detail_workers: u32,

    #[serde(default)]
    pub mode: CrawlMode,

    /// Skip listings whose id is already in the database
    #[serde(rename = "skip-known-listings", default = "default_skip_known_listings")]
    pub skip_known_listings: bool,
}

/// Remote endpoints and the shape of their responses
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Postal code to region token lookup
    #[serde(rename = "geography-url")]
    pub geography_url: String,

    /// Paginated listing search
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// JSON pointer to the HTML fragment in a search response
    #[serde(rename = "fragment-pointer", default = "default_fragment_pointer")]
    pub fragment_pointer: String,

    /// JSON pointer to the pin string in a search response
    #[serde(rename = "pins-pointer", default = "default_pins_pointer")]
    pub pins_pointer: String,

    /// CSS selector matching one anchor per listing inside the fragment
    #[serde(rename = "listing-selector", default = "default_listing_selector")]
    pub listing_selector: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Where the postal codes to crawl come from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZipcodeConfig {
    /// Inline list of postal codes
    #[serde(default)]
    pub codes: Vec<String>,

    /// File with one postal code per line
    pub file: Option<String>,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_detail_workers() -> u32 {
    1
}

fn default_skip_known_listings() -> bool {
    true
}

fn default_fragment_pointer() -> String {
    "/PlacardState/HTML".to_string()
}

fn default_pins_pointer() -> String {
    "/PinsState/cl".to_string()
}

fn default_listing_selector() -> String {
    "article.placard a.property-link".to_string()
}
