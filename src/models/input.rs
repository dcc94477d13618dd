// src/models/input.rs

//! Run input: budgets, start URLs and search filters.
//!
//! Values are coerced rather than validated: numbers may arrive as strings,
//! unusable budgets fall back to their defaults and anything below one is
//! clamped to one.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Result;

const DEFAULT_RESULTS_WANTED: usize = 20;
const DEFAULT_MAX_PAGES: u32 = 50;
const SEARCH_BASE: &str = "https://www.carfax.com/Used-";

/// Input for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlInput {
    /// Explicit start URLs (strings or `{ "url": ... }` objects)
    #[serde(default, rename = "startUrls", deserialize_with = "lenient_urls")]
    pub start_urls: Vec<String>,

    #[serde(default, rename = "startUrl", deserialize_with = "lenient_string")]
    pub start_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,

    /// Filters used to build a search URL when no start URL is given
    #[serde(flatten)]
    pub filters: SearchFilters,

    /// Target number of records
    #[serde(default = "default_results_wanted", deserialize_with = "lenient_results_wanted")]
    pub results_wanted: usize,

    /// Page budget per start URL
    #[serde(default = "default_max_pages", deserialize_with = "lenient_max_pages")]
    pub max_pages: u32,
}

impl Default for CrawlInput {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            start_url: None,
            url: None,
            filters: SearchFilters::default(),
            results_wanted: DEFAULT_RESULTS_WANTED,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl CrawlInput {
    /// Parse input JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolved start URL set: explicit URLs in order, else one built from filters.
    pub fn resolved_start_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for candidate in self
            .start_urls
            .iter()
            .chain(self.start_url.as_ref())
            .chain(self.url.as_ref())
        {
            let candidate = candidate.trim();
            if !candidate.is_empty() && !urls.iter().any(|u| u == candidate) {
                urls.push(candidate.to_string());
            }
        }
        if urls.is_empty() {
            urls.push(self.filters.search_url());
        }
        urls
    }
}

/// Search filters for the built start URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, deserialize_with = "lenient_string")]
    pub make: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year_min: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year_max: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price_min: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price_max: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mileage_max: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
}

impl SearchFilters {
    /// Build `https://www.carfax.com/Used-{Make}-{Model}?yearMin=..`.
    pub fn search_url(&self) -> String {
        let slug = |s: &str| s.split_whitespace().collect::<Vec<_>>().join("-");
        let path = match (self.make.as_deref(), self.model.as_deref()) {
            (Some(make), Some(model)) => slug(&format!("{make}-{model}")),
            (Some(make), None) => slug(make),
            _ => "Cars".to_string(),
        };
        let base = format!("{SEARCH_BASE}{path}");

        let params: Vec<(&str, &str)> = [
            ("yearMin", &self.year_min),
            ("yearMax", &self.year_max),
            ("priceMin", &self.price_min),
            ("priceMax", &self.price_max),
            ("mileageMax", &self.mileage_max),
            ("location", &self.location),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect();

        if params.is_empty() {
            return base;
        }
        match Url::parse(&base) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(params);
                url.to_string()
            }
            Err(_) => base,
        }
    }
}

fn default_results_wanted() -> usize {
    DEFAULT_RESULTS_WANTED
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

/// Coerce a JSON value into a number: numbers as-is, numeric strings parsed.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_results_wanted<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<usize, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(coerce_number(&value)
        .map(|n| n.max(1.0) as usize)
        .unwrap_or(DEFAULT_RESULTS_WANTED))
}

fn lenient_max_pages<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(coerce_number(&value)
        .map(|n| n.clamp(1.0, u32::MAX as f64) as u32)
        .unwrap_or(DEFAULT_MAX_PAGES))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_urls<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    let value = Value::deserialize(d)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .collect())
}
