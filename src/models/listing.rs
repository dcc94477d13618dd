// src/models/listing.rs

//! Raw and canonical vehicle listing records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An untyped bag of fields as produced by a single extraction strategy.
///
/// The shape depends on the source; the normalizer resolves the differences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawListing(pub Map<String, Value>);

impl RawListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; only objects are listings.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a field, skipping nulls so fallbacks keep working.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if !value.is_null() {
            self.0.insert(key.to_string(), value);
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionMethod {
    /// Client-side reactive state object
    #[serde(rename = "MobX")]
    ReactiveState,
    /// Captured background responses
    #[serde(rename = "XHR")]
    InterceptedResponse,
    /// Embedded JSON-LD metadata
    #[serde(rename = "JSON-LD")]
    StructuredData,
    /// Listing-card markup
    #[serde(rename = "DOM")]
    Markup,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReactiveState => "MobX",
            Self::InterceptedResponse => "XHR",
            Self::StructuredData => "JSON-LD",
            Self::Markup => "DOM",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stable output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub vin: Option<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,

    /// Whole currency units
    pub price: Option<u64>,

    /// ISO currency code, `USD` when the source omits it
    pub currency: String,

    pub mileage: Option<u64>,

    /// Display form of the mileage (e.g. "42,318 miles")
    pub mileage_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,

    pub image_url: Option<String>,
    pub listing_url: Option<String>,
    pub dealer_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_to_dealer: Option<f64>,

    pub stock_number: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub source_site: String,
    pub extraction_method: ExtractionMethod,
}

impl CanonicalListing {
    /// A record is emittable when it names the vehicle somehow.
    pub fn is_identifiable(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.vin.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Identity used for cross-page deduplication: VIN, then listing URL.
    pub fn dedupe_key(&self) -> Option<String> {
        self.vin
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| format!("vin:{}", v.trim().to_ascii_uppercase()))
            .or_else(|| {
                self.listing_url
                    .as_deref()
                    .filter(|u| !u.trim().is_empty())
                    .map(|u| format!("url:{}", u.trim()))
            })
    }
}

#[cfg(test)]
pub(crate) fn sample_listing(vin: Option<&str>, title: Option<&str>) -> CanonicalListing {
    CanonicalListing {
        vin: vin.map(str::to_string),
        title: title.map(str::to_string),
        year: Some(2019),
        make: Some("Honda".to_string()),
        model: Some("Civic".to_string()),
        trim: None,
        price: Some(17_995),
        currency: "USD".to_string(),
        mileage: Some(42_318),
        mileage_label: None,
        badge: None,
        image_url: None,
        listing_url: None,
        dealer_name: None,
        distance_to_dealer: None,
        stock_number: None,
        scraped_at: Utc::now(),
        source_site: "carfax.com".to_string(),
        extraction_method: ExtractionMethod::ReactiveState,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_listing_skips_nulls() {
        let raw = RawListing::new()
            .with("title", "2019 Honda Civic")
            .with("price", Value::Null);
        assert!(raw.get("title").is_some());
        assert!(raw.get("price").is_none());
    }

    #[test]
    fn test_raw_listing_from_non_object() {
        assert!(RawListing::from_value(json!([1, 2])).is_none());
        assert!(RawListing::from_value(json!({"vin": "1HG"})).is_some());
    }

    #[test]
    fn test_identifiable() {
        assert!(sample_listing(Some("1HGCM82633A004352"), None).is_identifiable());
        assert!(sample_listing(None, Some("2019 Honda Civic")).is_identifiable());
        assert!(!sample_listing(None, Some("   ")).is_identifiable());
        assert!(!sample_listing(None, None).is_identifiable());
    }

    #[test]
    fn test_dedupe_key_prefers_vin() {
        let mut listing = sample_listing(Some("1hgcm82633a004352"), Some("Civic"));
        listing.listing_url = Some("https://www.carfax.com/vehicle/1".to_string());
        assert_eq!(
            listing.dedupe_key().as_deref(),
            Some("vin:1HGCM82633A004352")
        );

        listing.vin = None;
        assert_eq!(
            listing.dedupe_key().as_deref(),
            Some("url:https://www.carfax.com/vehicle/1")
        );

        listing.listing_url = None;
        assert!(listing.dedupe_key().is_none());
    }

    #[test]
    fn test_extraction_method_serializes_as_tag() {
        let value = serde_json::to_value(ExtractionMethod::Markup).unwrap();
        assert_eq!(value, json!("DOM"));
        assert_eq!(ExtractionMethod::ReactiveState.to_string(), "MobX");
    }
}
