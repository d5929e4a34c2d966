//! HTTP fetcher implementation
//!
//! This module handles the raw HTTP exchange for the crawler:
//! - Building the HTTP client with the fixed request headers the site expects
//! - Sending one request and reducing the response to a `FetchResult`
//!
//! Deciding what a `FetchResult` means (retry, give up, parse) is the job of
//! the retry module.

use crate::config::Config;
use crate::crawler::throttle::Throttle;
use crate::{ConfigError, CrawlError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of a single HTTP exchange
#[derive(Debug)]
pub enum FetchResult {
    /// HTTP 200 with a readable body
    Success {
        /// HTTP status code
        status_code: u16,
        /// Response body
        body: String,
    },

    /// HTTP 404
    NotFound,

    /// Any other non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, truncated body, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Everything a component needs to issue throttled, retried requests
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct HttpContext {
    pub client: Client,
    pub throttle: Throttle,
    pub max_attempts: u32,
}

impl HttpContext {
    /// Builds the client, throttle and retry ceiling from configuration
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        Ok(Self {
            client: build_http_client(
                &config.headers,
                Duration::from_secs(config.crawler.request_timeout_secs),
            )?,
            throttle: Throttle::from_config(&config.crawler),
            max_attempts: config.crawler.max_attempts,
        })
    }
}

/// Builds an HTTP client that replays the configured headers on every request
///
/// # Arguments
///
/// * `headers` - Header name/value pairs sent with every request
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use std::collections::BTreeMap;
/// use std::time::Duration;
/// use zip_sweep::crawler::build_http_client;
///
/// let mut headers = BTreeMap::new();
/// headers.insert("User-Agent".to_string(), "Mozilla/5.0".to_string());
///
/// let client = build_http_client(&headers, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    headers: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<Client, CrawlError> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| {
                ConfigError::Validation(format!("Invalid value for header '{}'", name.as_str()))
            })?;
        default_headers.insert(name, value);
    }

    let client = Client::builder()
        .default_headers(default_headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Sends a prepared request and classifies the transport-level outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 200 with readable body | `Success` |
/// | HTTP 404 | `NotFound` |
/// | Any other status | `HttpError` |
/// | Timeout, refused connection, body read failure | `NetworkError` |
pub async fn fetch(request: RequestBuilder) -> FetchResult {
    match request.send().await {
        Ok(response) => {
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return FetchResult::NotFound;
            }

            if status != StatusCode::OK {
                return FetchResult::HttpError {
                    status_code: status.as_u16(),
                };
            }

            match response.text().await {
                Ok(body) => FetchResult::Success {
                    status_code: status.as_u16(),
                    body,
                },
                Err(e) => FetchResult::NetworkError {
                    error: e.to_string(),
                },
            }
        }
        Err(e) => {
            if e.is_timeout() {
                FetchResult::NetworkError {
                    error: "Request timeout".to_string(),
                }
            } else if e.is_connect() {
                FetchResult::NetworkError {
                    error: "Connection refused".to_string(),
                }
            } else {
                FetchResult::NetworkError {
                    error: e.to_string(),
                }
            }
        }
    }
}
