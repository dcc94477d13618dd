//! Listing normalizer.
//!
//! Maps a raw listing, whatever its source shape, onto [`CanonicalListing`].
//! Each target field is resolved from an ordered list of candidate keys; a
//! missing field becomes `None`, never an error.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{CanonicalListing, ExtractionMethod, RawListing};
use crate::utils::json::{as_whole_number, first_float, first_string, first_whole_number};
use crate::utils::normalize_whitespace;

const DEFAULT_CURRENCY: &str = "USD";

const VIN_KEYS: &[&str] = &["vin", "vehicleIdentificationNumber"];
const TITLE_KEYS: &[&str] = &["title", "name", "headline"];
const YEAR_KEYS: &[&str] = &["year", "modelYear", "vehicleModelDate"];
const MAKE_KEYS: &[&str] = &["make", "brand.name", "brand", "manufacturer"];
const MODEL_KEYS: &[&str] = &["model"];
const TRIM_KEYS: &[&str] = &["trim", "vehicleConfiguration"];
const PRICE_KEYS: &[&str] = &["listPrice", "currentPrice", "price"];
const CURRENCY_KEYS: &[&str] = &["currency", "priceCurrency"];
const BADGE_KEYS: &[&str] = &["badge"];
const IMAGE_KEYS: &[&str] = &["primaryImageUrl", "imageUrl", "image"];
const URL_KEYS: &[&str] = &["vehicleUrl", "url", "listingUrl"];
const DEALER_KEYS: &[&str] = &["dealerName", "dealer.name"];
const DISTANCE_KEYS: &[&str] = &["distanceToDealer"];
const STOCK_KEYS: &[&str] = &["stockNumber", "stock_number"];

/// Maps raw listings to the canonical schema.
#[derive(Debug, Clone)]
pub struct Normalizer {
    source_site: String,
}

impl Normalizer {
    pub fn new(source_site: impl Into<String>) -> Self {
        Self {
            source_site: source_site.into(),
        }
    }

    /// Normalize one raw listing. Total: never fails.
    pub fn normalize(
        &self,
        raw: &RawListing,
        method: ExtractionMethod,
        scraped_at: DateTime<Utc>,
    ) -> CanonicalListing {
        let item = Value::Object(raw.0.clone());

        let year = first_whole_number(&item, YEAR_KEYS)
            .filter(|y| (1886..=9999).contains(y))
            .map(|y| y as u32);
        let make = first_string(&item, MAKE_KEYS);
        let model = first_string(&item, MODEL_KEYS);
        let (mileage, mileage_label) = resolve_mileage(item.get("mileage"));

        let title = first_string(&item, TITLE_KEYS)
            .map(|t| normalize_whitespace(&t))
            .or_else(|| compose_title(year, make.as_deref(), model.as_deref()));

        CanonicalListing {
            vin: first_string(&item, VIN_KEYS),
            title,
            year,
            make,
            model,
            trim: first_string(&item, TRIM_KEYS),
            price: first_whole_number(&item, PRICE_KEYS),
            currency: first_string(&item, CURRENCY_KEYS)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            mileage,
            mileage_label,
            badge: first_string(&item, BADGE_KEYS),
            image_url: first_string(&item, IMAGE_KEYS),
            listing_url: first_string(&item, URL_KEYS),
            dealer_name: first_string(&item, DEALER_KEYS),
            distance_to_dealer: first_float(&item, DISTANCE_KEYS),
            stock_number: first_string(&item, STOCK_KEYS),
            scraped_at,
            source_site: self.source_site.clone(),
            extraction_method: method,
        }
    }

    /// Normalize a batch, keeping only records that carry a title or a VIN.
    pub fn normalize_all(
        &self,
        raws: &[RawListing],
        method: ExtractionMethod,
    ) -> Vec<CanonicalListing> {
        let scraped_at = Utc::now();
        raws.iter()
            .map(|raw| self.normalize(raw, method, scraped_at))
            .filter(CanonicalListing::is_identifiable)
            .collect()
    }
}

/// Mileage arrives as a number, a numeric string, or `{ value, label }`.
fn resolve_mileage(value: Option<&Value>) -> (Option<u64>, Option<String>) {
    match value {
        Some(Value::Object(map)) => {
            let mileage = map.get("value").and_then(as_whole_number);
            let label = map
                .get("label")
                .or_else(|| map.get("unitText"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            (mileage, label)
        }
        Some(other) => (as_whole_number(other), None),
        None => (None, None),
    }
}

/// "{year} {make} {model}", or `None` when all three are missing.
fn compose_title(year: Option<u32>, make: Option<&str>, model: Option<&str>) -> Option<String> {
    let year = year.map(|y| y.to_string());
    let parts: Vec<&str> = [year.as_deref(), make, model].into_iter().flatten().collect();
    let title = parts.join(" ");
    (!title.trim().is_empty()).then_some(title)
}
