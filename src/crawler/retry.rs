//! Bounded retry with centralized response classification
//!
//! Every network operation in the crawler goes through [`with_retry`]. One
//! attempt is one throttled request whose outcome is reduced to a
//! [`Classified`] value:
//!
//! | Classified | Meaning | Retry action |
//! |------------|---------|--------------|
//! | `Value` | 200 and the body has the expected structure | stop, return it |
//! | `NoResults` | 200 and the body is a well-formed empty answer | stop, return it |
//! | `Malformed` | 200 but the expected structure is missing | stop, extraction error |
//! | `Transient` | other status or transport failure | try again |
//!
//! When every allowed attempt was transient the operation fails as
//! [`CrawlError::Blocked`].

use crate::crawler::fetcher::FetchResult;
use crate::crawler::throttle::Throttle;
use crate::CrawlError;
use std::future::Future;

/// Outcome of one attempt after looking at the response
#[derive(Debug, Clone, PartialEq)]
pub enum Classified<T> {
    Value(T),
    NoResults,
    Malformed(String),
    Transient(String),
}

/// Terminal, non-error outcome of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieved<T> {
    Found(T),
    NoResults,
}

impl<T> Retrieved<T> {
    /// Converts to an `Option`, mapping `NoResults` to `None`
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NoResults => None,
        }
    }
}

/// How an HTTP 404 should be read for a given endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// The endpoint should always exist; a 404 is a hiccup
    Transient,

    /// The resource is gone; a 404 is a valid empty answer
    NoResults,
}

/// Attempt bookkeeping for one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts_made: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
        }
    }

    pub fn record_attempt(&mut self) {
        self.attempts_made += 1;
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

/// Reduces a transport result to a classification
///
/// `parse` only sees bodies of successful responses.
pub fn classify<T, P>(result: FetchResult, not_found: NotFoundPolicy, parse: P) -> Classified<T>
where
    P: FnOnce(&str) -> Classified<T>,
{
    match result {
        FetchResult::Success { body, .. } => parse(&body),
        FetchResult::NotFound => match not_found {
            NotFoundPolicy::NoResults => Classified::NoResults,
            NotFoundPolicy::Transient => Classified::Transient("HTTP 404".to_string()),
        },
        FetchResult::HttpError { status_code } => {
            Classified::Transient(format!("HTTP {}", status_code))
        }
        FetchResult::NetworkError { error } => Classified::Transient(error),
    }
}

/// Runs `attempt` until it yields a terminal classification or `max_attempts` is spent
///
/// The throttle is awaited before every attempt. `target` names the operation
/// in logs and errors.
///
/// # Returns
///
/// * `Ok(Retrieved::Found(value))` - An attempt produced the expected structure
/// * `Ok(Retrieved::NoResults)` - An attempt produced a well-formed empty answer
/// * `Err(CrawlError::Extraction)` - An attempt succeeded but the structure was wrong
/// * `Err(CrawlError::Blocked)` - Every attempt failed transiently
pub async fn with_retry<T, F, Fut>(
    throttle: &Throttle,
    max_attempts: u32,
    target: &str,
    mut attempt: F,
) -> Result<Retrieved<T>, CrawlError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Classified<T>>,
{
    let mut state = RetryState::new(max_attempts);

    while !state.is_exhausted() {
        throttle.wait().await;
        state.record_attempt();

        match attempt().await {
            Classified::Value(value) => return Ok(Retrieved::Found(value)),
            Classified::NoResults => return Ok(Retrieved::NoResults),
            Classified::Malformed(message) => {
                return Err(CrawlError::Extraction {
                    target: target.to_string(),
                    message,
                });
            }
            Classified::Transient(reason) => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}",
                    state.attempts_made(),
                    max_attempts,
                    target,
                    reason
                );
            }
        }
    }

    Err(CrawlError::Blocked {
        target: target.to_string(),
        attempts: state.attempts_made(),
    })
}
