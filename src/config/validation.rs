use crate::config::types::{Config, CrawlerConfig, EndpointConfig, OutputConfig, ZipcodeConfig};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use scraper::Selector;
use std::collections::BTreeMap;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_endpoint_config(&config.endpoints)?;
    validate_headers(&config.headers)?;
    validate_output_config(&config.output)?;
    validate_zipcode_config(&config.zipcodes)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 100 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 100, got {}",
            config.max_attempts
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.max_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms must be <= 60000ms, got {}ms",
            config.max_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.detail_workers < 1 || config.detail_workers > 32 {
        return Err(ConfigError::Validation(format!(
            "detail_workers must be between 1 and 32, got {}",
            config.detail_workers
        )));
    }

    Ok(())
}

/// Validates endpoint URLs, pointers and the listing selector
fn validate_endpoint_config(config: &EndpointConfig) -> Result<(), ConfigError> {
    validate_endpoint_url("geography_url", &config.geography_url)?;
    validate_endpoint_url("search_url", &config.search_url)?;

    for (name, pointer) in [
        ("fragment_pointer", &config.fragment_pointer),
        ("pins_pointer", &config.pins_pointer),
    ] {
        if !pointer.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must be a JSON pointer starting with '/', got '{}'",
                name, pointer
            )));
        }
    }

    Selector::parse(&config.listing_selector).map_err(|e| {
        ConfigError::InvalidSelector(format!("'{}': {:?}", config.listing_selector, e))
    })?;

    Ok(())
}

fn validate_endpoint_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}

/// Validates that every replayed header is a legal HTTP header
fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates inline postal codes
fn validate_zipcode_config(config: &ZipcodeConfig) -> Result<(), ConfigError> {
    for code in &config.codes {
        validate_zipcode(code)?;
    }

    if let Some(file) = &config.file {
        if file.is_empty() {
            return Err(ConfigError::Validation(
                "zipcodes.file cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// A postal code is a non-empty token without whitespace
pub(crate) fn validate_zipcode(code: &str) -> Result<(), ConfigError> {
    if code.is_empty() || code.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "Invalid postal code '{}'",
            code
        )));
    }
    Ok(())
}
