//! Listing references and records
//!
//! A `ListingReference` comes out of pagination and is consumed once; a
//! `ListingRecord` is the fully extracted result handed to the sink.

use chrono::NaiveDate;
use serde::Serialize;
use url::Url;

/// A listing found on a result page (or in the map pins)
#[derive(Debug, Clone, PartialEq)]
pub struct ListingReference {
    /// Absolute detail URL, or the bare listing id for map pins
    pub id_or_url: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl ListingReference {
    /// A reference to a detail page, without coordinates
    pub fn from_url(url: &Url) -> Self {
        Self {
            id_or_url: url.to_string(),
            lat: None,
            lon: None,
        }
    }

    /// A map pin: listing id plus coordinates
    pub fn pin(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id_or_url: id.into(),
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    /// The stable listing id this reference points at
    ///
    /// For URLs this is the last non-empty path segment; anything else is
    /// already an id.
    pub fn listing_id(&self) -> String {
        match Url::parse(&self.id_or_url) {
            Ok(url) => listing_id_from_url(&url),
            Err(_) => self.id_or_url.clone(),
        }
    }
}

/// A fully extracted listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub description: String,
    /// Ordered, de-duplicated, non-empty feature strings
    pub features: Vec<String>,
    pub captured_on: NaiveDate,
}

impl ListingRecord {
    /// Builds a coordinates-only record from a map pin
    ///
    /// Returns None if the reference has no coordinates.
    pub fn from_pin(reference: &ListingReference, captured_on: NaiveDate) -> Option<Self> {
        Some(Self {
            id: reference.listing_id(),
            lat: reference.lat?,
            lon: reference.lon?,
            description: String::new(),
            features: Vec::new(),
            captured_on,
        })
    }
}

/// Derives a listing id from its detail URL
///
/// Detail URLs end in the listing key (`/the-lofts-los-angeles-ca/k3x9p2q/`),
/// so the last non-empty path segment is used. Falls back to the full URL.
pub fn listing_id_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}
