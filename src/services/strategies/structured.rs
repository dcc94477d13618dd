//! Embedded structured-metadata strategy: JSON-LD vehicle entities.

use std::sync::LazyLock;

use scraper::Selector;
use serde_json::{Value, json};

use super::ExtractionStrategy;
use crate::error::{AppError, Result};
use crate::models::{ExtractionMethod, PageSnapshot, RawListing};
use crate::utils::json::{as_whole_number, first_string};

/// Selector for JSON-LD script tags.
static JSONLD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script[type='application/ld+json']").expect("valid jsonld selector")
});

pub struct StructuredDataStrategy {
    types: Vec<String>,
}

impl StructuredDataStrategy {
    pub fn new(types: Vec<String>) -> Self {
        Self { types }
    }

    fn is_vehicle(&self, item: &Value) -> bool {
        let matches = |t: &str| self.types.iter().any(|want| want.eq_ignore_ascii_case(t));
        match item.get("@type") {
            Some(Value::String(t)) => matches(t),
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).any(matches),
            _ => false,
        }
    }
}

/// Flatten top-level arrays, `@graph` and `ItemList` wrappers into entities.
fn flatten_entities(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|i| flatten_entities(i, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_entities(graph, out);
            }
            if let Some(elements) = map.remove("itemListElement") {
                let items = match elements {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                for element in items {
                    // ListItem wraps the entity in `item`.
                    match element.get("item") {
                        Some(inner) if inner.is_object() => flatten_entities(inner.clone(), out),
                        _ => flatten_entities(element, out),
                    }
                }
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}

/// `offers` may be a single Offer, an array of them, or an AggregateOffer.
fn primary_offer(item: &Value) -> Option<&Value> {
    match item.get("offers")? {
        Value::Array(offers) => offers.first(),
        offer @ Value::Object(_) => Some(offer),
        _ => None,
    }
}

fn image_url(item: &Value) -> Option<String> {
    match item.get("image")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(images) => images.iter().find_map(|i| match i {
            Value::String(s) => Some(s.clone()),
            other => first_string(other, &["url", "contentUrl"]),
        }),
        other => first_string(other, &["url", "contentUrl"]),
    }
}

fn unit_label(unit: &str) -> &str {
    match unit {
        "SMI" => "mi",
        "KMT" => "km",
        other => other,
    }
}

/// Map a JSON-LD Car/Vehicle onto the raw listing keys the normalizer reads.
fn to_raw(item: &Value) -> RawListing {
    let mut raw = RawListing::new();
    raw.set("title", first_string(item, &["name"]));
    raw.set("vin", first_string(item, &["vehicleIdentificationNumber", "vin"]));
    raw.set("year", first_string(item, &["vehicleModelDate", "modelDate", "productionDate"])
        .and_then(|date| date.get(..4).and_then(|y| y.parse::<u32>().ok())));
    raw.set("make", first_string(item, &["brand.name", "brand", "manufacturer.name", "manufacturer"]));
    raw.set("model", first_string(item, &["model.name", "model"]));
    raw.set("trim", first_string(item, &["vehicleConfiguration"]));
    raw.set("url", first_string(item, &["url", "@id"]));
    raw.set("imageUrl", image_url(item));
    raw.set("stockNumber", first_string(item, &["sku"]));

    if let Some(offer) = primary_offer(item) {
        raw.set("price", first_string(offer, &["price", "lowPrice"]));
        raw.set("currency", first_string(offer, &["priceCurrency"]));
        raw.set("dealerName", first_string(offer, &["seller.name", "offeredBy.name"]));
        if raw.get("url").is_none() {
            raw.set("url", first_string(offer, &["url"]));
        }
    }

    if let Some(odometer) = item.get("mileageFromOdometer") {
        let value = odometer.get("value").unwrap_or(odometer);
        if let Some(miles) = as_whole_number(value) {
            let label = first_string(odometer, &["unitText", "unitCode"])
                .map(|unit| format!("{miles} {}", unit_label(&unit)));
            raw.set("mileage", json!({ "value": miles, "label": label }));
        }
    }
    raw
}

impl ExtractionStrategy for StructuredDataStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::StructuredData
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Result<Vec<RawListing>> {
        let document = snapshot.document();
        let mut entities = Vec::new();
        let mut blocks = 0;
        let mut malformed = 0;

        for script in document.select(&JSONLD_SELECTOR) {
            blocks += 1;
            let text: String = script.text().collect();
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(value) => flatten_entities(value, &mut entities),
                Err(e) => {
                    malformed += 1;
                    log::debug!("Skipping malformed JSON-LD block: {}", e);
                }
            }
        }

        if blocks > 0 && malformed == blocks {
            return Err(AppError::malformed(
                self.method().as_str(),
                format!("all {blocks} JSON-LD blocks failed to parse"),
            ));
        }

        Ok(entities
            .iter()
            .filter(|item| self.is_vehicle(item))
            .map(to_raw)
            .filter(|raw| !raw.is_empty())
            .collect())
    }
}
