//! Crawler module for region resolution, page walking and detail extraction
//!
//! This module contains the core crawling logic, including:
//! - Randomized throttling and bounded retry around every request
//! - Postal code to region resolution
//! - Ordered page walking with wrap-around detection
//! - Listing detail and map pin extraction
//! - Overall crawl coordination

mod coordinator;
mod detail;
mod fetcher;
mod listing;
mod parser;
mod pins;
mod region;
mod retry;
mod throttle;
mod walker;

pub use coordinator::{run_crawl, Coordinator, SharedStorage};
pub use detail::DetailFetcher;
pub use fetcher::{build_http_client, fetch, FetchResult, HttpContext};
pub use listing::{listing_id_from_url, ListingRecord, ListingReference};
pub use parser::{
    clean_feature, extract_listing_references, parse_detail, parse_pins, DetailFields, SearchPage,
};
pub use pins::PinScanner;
pub use region::{RegionDescriptor, RegionResolver};
pub use retry::{classify, with_retry, Classified, NotFoundPolicy, Retrieved, RetryState};
pub use throttle::Throttle;
pub use walker::{page_payload, PageWalker, SearchEndpoint};
