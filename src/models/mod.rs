// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod config;
mod input;
mod listing;
mod outcome;
mod selectors;
mod snapshot;

// Re-export all public types
pub use config::{Config, CrawlerConfig, DetectionConfig, ExtractionConfig, OutputConfig};
pub use input::{CrawlInput, SearchFilters};
pub use listing::{CanonicalListing, ExtractionMethod, RawListing};
pub use outcome::{CrawlSummary, DivertReason, PageClass, StopReason, UrlOutcome};
pub use selectors::ListingSelectors;
pub use snapshot::{CaptureBuffer, CapturedResponse, PageSnapshot};

#[cfg(test)]
pub(crate) use listing::sample_listing;
