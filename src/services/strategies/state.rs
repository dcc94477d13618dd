//! Reactive-state strategy: reads listings out of the page's client-side store.

use serde_json::Value;

use super::ExtractionStrategy;
use crate::error::{AppError, Result};
use crate::models::{ExtractionMethod, PageSnapshot, RawListing};
use crate::utils::json::array_at;

/// Shapes accepted on any top-level store when no configured path matches.
const STORE_SHAPES: &[&str] = &["results.listings", "listings"];

pub struct ReactiveStateStrategy {
    global: String,
    paths: Vec<String>,
}

impl ReactiveStateStrategy {
    pub fn new(global: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            global: global.into(),
            paths,
        }
    }

    fn find_listings<'a>(&self, state: &'a Value) -> Option<&'a Vec<Value>> {
        self.paths
            .iter()
            .find_map(|path| array_at(state, path))
            .or_else(|| {
                state.as_object()?.values().find_map(|store| {
                    STORE_SHAPES.iter().find_map(|shape| array_at(store, shape))
                })
            })
    }
}

impl ExtractionStrategy for ReactiveStateStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::ReactiveState
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Result<Vec<RawListing>> {
        let Some(state) = snapshot.state(&self.global) else {
            return Ok(Vec::new());
        };

        // Some pages hydrate from a serialized string rather than an object.
        let parsed;
        let state = match state {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text)
                    .map_err(|e| AppError::malformed(self.method().as_str(), e))?;
                &parsed
            }
            Value::Object(_) => state,
            _ => {
                return Err(AppError::malformed(
                    self.method().as_str(),
                    format!("{} is not an object", self.global),
                ));
            }
        };

        Ok(self
            .find_listings(state)
            .map(|items| items.iter().cloned().filter_map(RawListing::from_value).collect())
            .unwrap_or_default())
    }
}
