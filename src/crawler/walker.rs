//! Region page walking
//!
//! A [`PageWalker`] requests search result pages for one region in strict
//! order and hands out listing references one at a time. The backend never
//! says "last page"; asking past the end returns the last page again, so the
//! walk ends when a page opens with the same listing as the page before it.
//! That check lives in [`PageCursor::observe`].

use crate::config::EndpointConfig;
use crate::crawler::fetcher::{fetch, HttpContext};
use crate::crawler::listing::ListingReference;
use crate::crawler::parser::{parse_search_page, SearchPage};
use crate::crawler::region::RegionDescriptor;
use crate::crawler::retry::{classify, with_retry, NotFoundPolicy, Retrieved};
use crate::state::{CursorStep, PageCursor};
use crate::{ConfigError, CrawlError};
use scraper::Selector;
use serde_json::{json, Value};
use std::collections::VecDeque;
use url::Url;

/// The parsed search endpoint settings shared by every walk
#[derive(Debug, Clone)]
pub struct SearchEndpoint {
    pub url: Url,
    pub fragment_pointer: String,
    pub pins_pointer: String,
    pub listing_selector: Selector,
}

impl SearchEndpoint {
    pub fn from_config(endpoints: &EndpointConfig) -> Result<Self, ConfigError> {
        let url = Url::parse(&endpoints.search_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", endpoints.search_url, e)))?;
        let listing_selector = Selector::parse(&endpoints.listing_selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("{}: {:?}", endpoints.listing_selector, e))
        })?;

        Ok(Self {
            url,
            fragment_pointer: endpoints.fragment_pointer.clone(),
            pins_pointer: endpoints.pins_pointer.clone(),
            listing_selector,
        })
    }
}

/// Builds the request body for one result page
pub fn page_payload(region: &RegionDescriptor, page_index: u32) -> Value {
    json!({
        "Geography": region.payload,
        "Paging": {
            "Page": page_index,
            "CurrentPageListingKey": null,
        },
    })
}

/// Lazy, finite, single-pass sequence of listing references for one region
pub struct PageWalker {
    http: HttpContext,
    endpoint: SearchEndpoint,
    region: RegionDescriptor,
    cursor: PageCursor,
    pending: VecDeque<ListingReference>,
    finished: bool,
}

impl PageWalker {
    pub fn new(http: HttpContext, endpoint: SearchEndpoint, region: RegionDescriptor) -> Self {
        Self {
            http,
            endpoint,
            region,
            cursor: PageCursor::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Returns the next listing reference, fetching the next page when needed
    ///
    /// Returns `Ok(None)` once the walk is over. A walk ends on an empty
    /// page, a page without the listing fragment, a repeated page, or after
    /// a page that was cut short by a malformed entry. A page that cannot be
    /// retrieved at all surfaces as `CrawlError::Blocked`, after which the
    /// walker is finished.
    pub async fn next(&mut self) -> Result<Option<ListingReference>, CrawlError> {
        loop {
            if let Some(reference) = self.pending.pop_front() {
                return Ok(Some(reference));
            }

            if self.finished {
                return Ok(None);
            }

            self.fetch_next_page().await?;
        }
    }

    /// Index of the page the walker will request next
    pub fn page_index(&self) -> u32 {
        self.cursor.page_index()
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_empty()
    }

    async fn fetch_next_page(&mut self) -> Result<(), CrawlError> {
        let page_index = self.cursor.page_index();
        let target = format!("region {} page {}", self.region.token, page_index);
        let payload = page_payload(&self.region, page_index);

        let endpoint = &self.endpoint;
        let http = &self.http;
        let result = with_retry(&http.throttle, http.max_attempts, &target, || {
            let request = http.client.post(endpoint.url.clone()).json(&payload);
            async move {
                classify(fetch(request).await, NotFoundPolicy::Transient, |body| {
                    parse_search_page(
                        body,
                        &endpoint.fragment_pointer,
                        &endpoint.listing_selector,
                        &endpoint.url,
                    )
                })
            }
        })
        .await;

        let page = match result {
            Ok(Retrieved::Found(page)) => page,
            Ok(Retrieved::NoResults) => {
                tracing::debug!("{}: no listing fragment, walk complete", target);
                self.finished = true;
                return Ok(());
            }
            Err(CrawlError::Extraction { message, .. }) => {
                tracing::warn!("{}: no structured content ({}), walk complete", target, message);
                self.finished = true;
                return Ok(());
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        self.accept_page(page, &target);
        Ok(())
    }

    fn accept_page(&mut self, page: SearchPage, target: &str) {
        let SearchPage {
            references,
            truncated,
        } = page;

        let Some(first) = references.first() else {
            if truncated {
                tracing::warn!("{}: first entry is malformed, walk complete", target);
            } else {
                tracing::debug!("{}: empty page, walk complete", target);
            }
            self.finished = true;
            return;
        };

        if self.cursor.observe(&first.id_or_url) == CursorStep::WrappedAround {
            tracing::debug!("{}: repeats the previous page, walk complete", target);
            self.finished = true;
            return;
        }

        tracing::debug!("{}: {} listings", target, references.len());
        self.pending.extend(references);

        if truncated {
            tracing::warn!("{}: malformed entry, keeping the listings before it", target);
            self.finished = true;
        }
    }
}
