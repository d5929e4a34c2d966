//! Listing detail page retrieval

use crate::crawler::fetcher::{fetch, HttpContext};
use crate::crawler::listing::{ListingRecord, ListingReference};
use crate::crawler::parser::{parse_detail, DetailFields};
use crate::crawler::retry::{classify, with_retry, Classified, NotFoundPolicy};
use crate::CrawlError;
use chrono::Utc;

/// Fetches listing detail pages and turns them into records
///
/// Cloned into every detail worker.
#[derive(Debug, Clone)]
pub struct DetailFetcher {
    http: HttpContext,
}

impl DetailFetcher {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }

    /// Fetches one listing, reporting why it failed
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The page was fetched and every required field found
    /// * `Ok(None)` - The page is gone (HTTP 404)
    /// * `Err(CrawlError::Extraction)` - Required fields are missing from the page
    /// * `Err(CrawlError::Blocked)` - Every attempt failed transiently
    pub async fn try_fetch(
        &self,
        reference: &ListingReference,
    ) -> Result<Option<ListingRecord>, CrawlError> {
        let url = reference.id_or_url.as_str();

        let retrieved = with_retry(&self.http.throttle, self.http.max_attempts, url, || {
            let request = self.http.client.get(url);
            async move {
                classify(fetch(request).await, NotFoundPolicy::NoResults, |body| {
                    match parse_detail(body) {
                        Ok(fields) => Classified::Value(fields),
                        Err(message) => Classified::Malformed(message),
                    }
                })
            }
        })
        .await?;

        Ok(retrieved
            .found()
            .map(|fields| build_record(reference, fields)))
    }

    /// Fetches one listing; any failure becomes `None` and is logged
    pub async fn fetch(&self, reference: &ListingReference) -> Option<ListingRecord> {
        match self.try_fetch(reference).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::debug!("{}: listing no longer exists", reference.id_or_url);
                None
            }
            Err(e) => {
                tracing::warn!("Skipping listing: {}", e);
                None
            }
        }
    }
}

fn build_record(reference: &ListingReference, fields: DetailFields) -> ListingRecord {
    ListingRecord {
        id: reference.listing_id(),
        lat: fields.lat,
        lon: fields.lon,
        description: fields.description,
        features: fields.features,
        captured_on: Utc::now().date_naive(),
    }
}
