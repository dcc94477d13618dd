//! Service layer for the crawler application.
//!
//! This module contains the extraction and pagination engine:
//! - Listing extraction (`StrategyChain` and its strategies)
//! - Canonicalization (`Normalizer`)
//! - Block/redirect detection (`BlockDetector`)
//! - Budgeted emission (`ResultAccumulator`)
//! - Per-URL pagination (`PaginationController`)

mod accumulator;
mod detector;
mod normalizer;
mod paginator;
pub mod strategies;

pub use accumulator::ResultAccumulator;
pub use detector::BlockDetector;
pub use normalizer::Normalizer;
pub use paginator::{PaginationController, PaginationSettings};
pub use strategies::{Extraction, ExtractionStrategy, StrategyChain};
