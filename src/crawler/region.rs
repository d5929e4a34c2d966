//! Postal code to region resolution
//!
//! The geography endpoint answers a postal code with a JSON array of
//! candidate regions. The first candidate always wins.

use crate::crawler::fetcher::{fetch, HttpContext};
use crate::crawler::retry::{classify, with_retry, Classified, NotFoundPolicy, Retrieved};
use crate::CrawlError;
use serde_json::{json, Value};
use url::Url;

/// The region chosen for a postal code
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDescriptor {
    /// Short identifying token, used in logs
    pub token: String,

    /// The candidate exactly as the backend returned it; replayed verbatim
    /// as the `Geography` of every page request
    pub payload: Value,
}

impl RegionDescriptor {
    /// Builds a descriptor from one candidate of the geography response
    pub fn from_candidate(candidate: Value) -> Self {
        let token = match &candidate {
            Value::String(token) => token.clone(),
            Value::Object(fields) => fields
                .get("Geography")
                .or_else(|| fields.get("ID"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| candidate.to_string()),
            other => other.to_string(),
        };

        Self {
            token,
            payload: candidate,
        }
    }
}

/// Resolves postal codes against the geography endpoint
pub struct RegionResolver {
    http: HttpContext,
    geography_url: Url,
}

impl RegionResolver {
    pub fn new(http: HttpContext, geography_url: Url) -> Self {
        Self { http, geography_url }
    }

    /// Resolves a postal code to its first candidate region
    ///
    /// # Returns
    ///
    /// * `Ok(Some(region))` - The backend returned at least one candidate
    /// * `Ok(None)` - The backend returned an empty candidate list
    /// * `Err(CrawlError::Blocked)` - Every attempt failed transiently
    /// * `Err(CrawlError::Extraction)` - The response was not a JSON array
    pub async fn resolve(&self, postal_code: &str) -> Result<Option<RegionDescriptor>, CrawlError> {
        let target = format!("region for {}", postal_code);
        let payload = json!({ "t": postal_code });

        let retrieved = with_retry(&self.http.throttle, self.http.max_attempts, &target, || {
            let request = self
                .http
                .client
                .post(self.geography_url.clone())
                .json(&payload);
            async move {
                classify(fetch(request).await, NotFoundPolicy::Transient, parse_candidates)
            }
        })
        .await?;

        Ok(match retrieved {
            Retrieved::Found(region) => {
                tracing::debug!("Postal code {} resolved to region {}", postal_code, region.token);
                Some(region)
            }
            Retrieved::NoResults => None,
        })
    }
}

/// Picks the first candidate out of a geography response body
pub fn parse_candidates(body: &str) -> Classified<RegionDescriptor> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(candidates)) => match candidates.into_iter().next() {
            Some(first) => Classified::Value(RegionDescriptor::from_candidate(first)),
            None => Classified::NoResults,
        },
        Ok(_) => Classified::Malformed("geography response is not an array".to_string()),
        Err(e) => Classified::Malformed(format!("invalid JSON: {}", e)),
    }
}
