//! Intercepted-response strategy: listings from captured background responses.

use serde_json::Value;

use super::ExtractionStrategy;
use crate::error::Result;
use crate::models::{ExtractionMethod, PageSnapshot, RawListing};

/// How deep to look for a listings array inside one payload.
const MAX_DEPTH: usize = 4;

pub struct InterceptedResponseStrategy {
    keys: Vec<String>,
}

impl InterceptedResponseStrategy {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    fn collect(&self, value: &Value, depth: usize, out: &mut Vec<RawListing>) {
        if depth == 0 {
            return;
        }
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match child {
                        Value::Array(items) if self.keys.iter().any(|k| k == key) => {
                            out.extend(items.iter().cloned().filter_map(RawListing::from_value));
                        }
                        Value::Object(_) | Value::Array(_) => self.collect(child, depth - 1, out),
                        _ => {}
                    }
                }
            }
            // Batched responses arrive as arrays of payloads.
            Value::Array(items) => {
                for item in items.iter().filter(|i| i.is_object() || i.is_array()) {
                    self.collect(item, depth - 1, out);
                }
            }
            _ => {}
        }
    }
}

impl ExtractionStrategy for InterceptedResponseStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::InterceptedResponse
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Result<Vec<RawListing>> {
        let mut listings = Vec::new();
        for response in snapshot.captured().responses() {
            let before = listings.len();
            self.collect(&response.body, MAX_DEPTH, &mut listings);
            if listings.len() > before {
                log::debug!(
                    "Captured response {} carried {} listings",
                    response.url,
                    listings.len() - before
                );
            }
        }
        Ok(listings)
    }
}
