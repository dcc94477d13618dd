//! Extraction strategy chain.
//!
//! Each strategy is a pure function of a [`PageSnapshot`]. The chain runs them
//! in priority order and the first non-empty result wins; a strategy that
//! fails counts as empty and the chain moves on.

mod intercepted;
mod markup;
mod state;
mod structured;

pub use intercepted::InterceptedResponseStrategy;
pub use markup::MarkupStrategy;
pub use state::ReactiveStateStrategy;
pub use structured::StructuredDataStrategy;

use crate::error::Result;
use crate::models::{ExtractionConfig, ExtractionMethod, PageSnapshot, RawListing};

/// A single data source for listings.
pub trait ExtractionStrategy: Send + Sync {
    /// Tag stamped on records this strategy produced.
    fn method(&self) -> ExtractionMethod;

    /// Raw listings found on the page; empty when this source is absent.
    fn extract(&self, snapshot: &PageSnapshot) -> Result<Vec<RawListing>>;
}

/// The winning strategy's output.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub method: ExtractionMethod,
    pub listings: Vec<RawListing>,
}

/// Ordered list of strategies combined by "first non-empty wins".
pub struct StrategyChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Default order: reactive state, intercepted responses, JSON-LD, markup.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self::new(vec![
            Box::new(ReactiveStateStrategy::new(
                &config.state_global,
                config.state_paths.clone(),
            )),
            Box::new(InterceptedResponseStrategy::new(config.response_keys.clone())),
            Box::new(StructuredDataStrategy::new(config.structured_types.clone())),
            Box::new(MarkupStrategy::new(&config.selectors)?),
        ]))
    }

    pub fn methods(&self) -> Vec<ExtractionMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Run strategies in order until one yields listings.
    pub fn run(&self, snapshot: &PageSnapshot) -> Option<Extraction> {
        self.strategies.iter().find_map(|strategy| {
            let method = strategy.method();
            match strategy.extract(snapshot) {
                Ok(listings) if !listings.is_empty() => {
                    log::info!("Extracted {} vehicles from {}", listings.len(), method);
                    Some(Extraction { method, listings })
                }
                Ok(_) => {
                    log::debug!("{} yielded nothing on {}", method, snapshot.url());
                    None
                }
                Err(e) => {
                    log::debug!("{} extraction failed: {}", method, e);
                    None
                }
            }
        })
    }
}
