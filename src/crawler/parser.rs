//! Response parsing for search pages, map pins and listing detail pages
//!
//! This module handles:
//! - Pulling the HTML fragment out of a search response and turning its
//!   listing anchors into references
//! - Decoding the compact map pin string
//! - Extracting coordinates, description and features from a detail page

use crate::crawler::listing::ListingReference;
use crate::crawler::retry::Classified;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Coordinates live in Open Graph place metadata
const LATITUDE_SELECTOR: &str = r#"meta[property="place:location:latitude"]"#;
const LONGITUDE_SELECTOR: &str = r#"meta[property="place:location:longitude"]"#;

const DESCRIPTION_SELECTOR: &str = "#descriptionSection p";

const FEATURE_BLOCK_SELECTOR: &str = ".specList";
const FEATURE_ITEM_SELECTOR: &str = "li";
const FEATURE_LABEL_SELECTOR: &str = ".specLabel";

/// Decorative glyphs the site puts around feature text
const BULLET_GLYPHS: &[char] = &['•', '·', '●', '◦', '▪', '■', '►', '✓', '-', '*', '–', '—'];

/// Listing references found on one search result page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    /// Well-formed references, in page order
    pub references: Vec<ListingReference>,

    /// True if an entry without a usable reference cut the page short
    pub truncated: bool,
}

/// Fields extracted from a listing detail page
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFields {
    pub lat: f64,
    pub lon: f64,
    pub description: String,
    pub features: Vec<String>,
}

/// Parses a search response body into the listing references it holds
///
/// The response is JSON; the HTML fragment with the listing anchors sits at
/// `fragment_pointer`. A missing pointer means the site changed its contract
/// and is reported as `Malformed`; a null fragment means there is nothing to
/// show.
pub fn parse_search_page(
    body: &str,
    fragment_pointer: &str,
    listing_selector: &Selector,
    base_url: &Url,
) -> Classified<SearchPage> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => return Classified::Malformed(format!("invalid JSON: {}", e)),
    };

    match json.pointer(fragment_pointer) {
        None => Classified::Malformed(format!("missing {}", fragment_pointer)),
        Some(Value::Null) => Classified::NoResults,
        Some(Value::String(html)) => {
            Classified::Value(extract_listing_references(html, listing_selector, base_url))
        }
        Some(_) => Classified::Malformed(format!("{} is not a string", fragment_pointer)),
    }
}

/// Extracts one reference per listing anchor in `html`
///
/// Anchors are read in document order. The first anchor whose `href` is
/// missing or unusable ends the page: the references before it are kept and
/// the page is flagged as truncated.
///
/// # Example
///
/// ```
/// use scraper::Selector;
/// use url::Url;
/// use zip_sweep::crawler::extract_listing_references;
///
/// let html = r#"<article class="placard"><a class="property-link" href="/the-lofts/k3x9p2q/">Lofts</a></article>"#;
/// let selector = Selector::parse("a.property-link").unwrap();
/// let base = Url::parse("https://www.example.com/services/search/").unwrap();
///
/// let page = extract_listing_references(html, &selector, &base);
/// assert_eq!(page.references[0].id_or_url, "https://www.example.com/the-lofts/k3x9p2q/");
/// assert!(!page.truncated);
/// ```
pub fn extract_listing_references(html: &str, listing_selector: &Selector, base_url: &Url) -> SearchPage {
    let fragment = Html::parse_fragment(html);
    let mut references = Vec::new();

    for element in fragment.select(listing_selector) {
        match element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        {
            Some(url) => references.push(ListingReference::from_url(&url)),
            None => {
                return SearchPage {
                    references,
                    truncated: true,
                }
            }
        }
    }

    SearchPage {
        references,
        truncated: false,
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link is unusable as a detail page:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel: schemes and data: URIs
/// - anything that is not HTTP(S) after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Parses a search response body holding the map pin string at `pins_pointer`
pub fn parse_pin_response(body: &str, pins_pointer: &str) -> Classified<Vec<ListingReference>> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => return Classified::Malformed(format!("invalid JSON: {}", e)),
    };

    match json.pointer(pins_pointer) {
        None => Classified::Malformed(format!("missing {}", pins_pointer)),
        Some(Value::Null) => Classified::NoResults,
        Some(Value::String(raw)) if raw.trim().is_empty() => Classified::NoResults,
        Some(Value::String(raw)) => Classified::Value(parse_pins(raw)),
        Some(_) => Classified::Malformed(format!("{} is not a string", pins_pointer)),
    }
}

/// Decodes the compact map pin string
///
/// Pins are separated by `~` and their fields by `|`. Field 0 is the listing
/// id, field 2 is either `null` or a JSON array of `{"ListingId": ...}`
/// objects for buildings holding several listings, and fields 3 and 4 are the
/// latitude and longitude shared by every listing of the pin. Pins with
/// missing fields or non-numeric coordinates are skipped.
pub fn parse_pins(raw: &str) -> Vec<ListingReference> {
    let mut references = Vec::new();

    for pin in raw.split('~') {
        let fields: Vec<&str> = pin.split('|').collect();
        if fields.len() < 5 {
            continue;
        }

        let (Ok(lat), Ok(lon)) = (
            fields[3].trim().parse::<f64>(),
            fields[4].trim().parse::<f64>(),
        ) else {
            tracing::debug!("Skipping pin with invalid coordinates: {}", pin);
            continue;
        };

        if fields[2] == "null" {
            let id = fields[0].trim();
            if !id.is_empty() {
                references.push(ListingReference::pin(id, lat, lon));
            }
            continue;
        }

        match serde_json::from_str::<Vec<Value>>(fields[2]) {
            Ok(listings) => {
                for listing in listings {
                    let id = match listing.get("ListingId") {
                        Some(Value::String(id)) => id.clone(),
                        Some(Value::Number(id)) => id.to_string(),
                        _ => continue,
                    };
                    references.push(ListingReference::pin(id, lat, lon));
                }
            }
            Err(e) => tracing::debug!("Skipping pin with invalid listing list: {}", e),
        }
    }

    references
}

/// Extracts the required fields from a listing detail page
///
/// Coordinates and description are required; a page without them yields an
/// error message describing what is missing. Features are optional.
pub fn parse_detail(html: &str) -> Result<DetailFields, String> {
    let document = Html::parse_document(html);

    let lat = extract_coordinate(&document, LATITUDE_SELECTOR, "latitude")?;
    let lon = extract_coordinate(&document, LONGITUDE_SELECTOR, "longitude")?;
    let description = extract_description(&document)?;
    let features = extract_features(&document)?;

    Ok(DetailFields {
        lat,
        lon,
        description,
        features,
    })
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("bad selector {}: {:?}", css, e))
}

fn extract_coordinate(document: &Html, css: &str, name: &str) -> Result<f64, String> {
    let sel = selector(css)?;
    let content = document
        .select(&sel)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .ok_or_else(|| format!("missing {} metadata", name))?;

    content
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{} metadata '{}' is not a number", name, content))
}

fn extract_description(document: &Html) -> Result<String, String> {
    let sel = selector(DESCRIPTION_SELECTOR)?;
    let paragraphs: Vec<String> = document
        .select(&sel)
        .map(|p| normalize_whitespace(&element_text(&p)))
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return Err("missing description".to_string());
    }

    Ok(paragraphs.join("\n"))
}

/// Collects features from every feature block, in document order
///
/// A block with list items contributes one feature per item. A block without
/// items but with exactly one label contributes that label.
fn extract_features(document: &Html) -> Result<Vec<String>, String> {
    let block_sel = selector(FEATURE_BLOCK_SELECTOR)?;
    let item_sel = selector(FEATURE_ITEM_SELECTOR)?;
    let label_sel = selector(FEATURE_LABEL_SELECTOR)?;

    let mut features = Vec::new();
    let mut seen = HashSet::new();

    for block in document.select(&block_sel) {
        let mut raw: Vec<String> = block.select(&item_sel).map(|li| element_text(&li)).collect();

        if raw.is_empty() {
            let labels: Vec<String> = block
                .select(&label_sel)
                .map(|label| element_text(&label))
                .collect();
            if labels.len() == 1 {
                raw = labels;
            }
        }

        for feature in raw.iter().filter_map(|text| clean_feature(text)) {
            if seen.insert(feature.clone()) {
                features.push(feature);
            }
        }
    }

    Ok(features)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips bullet glyphs and whitespace; returns None if nothing is left
pub fn clean_feature(raw: &str) -> Option<String> {
    let collapsed = normalize_whitespace(raw);
    let cleaned = collapsed.trim_matches(|c: char| c.is_whitespace() || BULLET_GLYPHS.contains(&c));

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
