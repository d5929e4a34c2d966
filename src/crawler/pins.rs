//! Map pin scanning
//!
//! The lightweight crawl mode: one search request per region, read the
//! compact pin string and turn every pin into a coordinates-only reference.

use crate::crawler::fetcher::{fetch, HttpContext};
use crate::crawler::listing::ListingReference;
use crate::crawler::parser::parse_pin_response;
use crate::crawler::region::RegionDescriptor;
use crate::crawler::retry::{classify, with_retry, NotFoundPolicy, Retrieved};
use crate::crawler::walker::SearchEndpoint;
use crate::CrawlError;
use serde_json::json;

pub struct PinScanner {
    http: HttpContext,
    endpoint: SearchEndpoint,
}

impl PinScanner {
    pub fn new(http: HttpContext, endpoint: SearchEndpoint) -> Self {
        Self { http, endpoint }
    }

    /// Fetches every pin of a region
    ///
    /// An absent or empty pin string yields an empty list. A response without
    /// the pin key surfaces as `CrawlError::Extraction`.
    pub async fn scan(&self, region: &RegionDescriptor) -> Result<Vec<ListingReference>, CrawlError> {
        let target = format!("pins for region {}", region.token);
        let payload = json!({ "Geography": region.payload });
        let endpoint = &self.endpoint;

        let retrieved = with_retry(&self.http.throttle, self.http.max_attempts, &target, || {
            let request = self.http.client.post(endpoint.url.clone()).json(&payload);
            async move {
                classify(fetch(request).await, NotFoundPolicy::Transient, |body| {
                    parse_pin_response(body, &endpoint.pins_pointer)
                })
            }
        })
        .await?;

        let pins = match retrieved {
            Retrieved::Found(pins) => pins,
            Retrieved::NoResults => Vec::new(),
        };
        tracing::debug!("{}: {} pins", target, pins.len());

        Ok(pins)
    }
}
