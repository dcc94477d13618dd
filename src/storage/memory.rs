//! In-memory sinks.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::CanonicalListing;
use crate::render::Artifact;
use crate::storage::{DatasetSink, DiagnosticSink};

/// Keeps the dataset and diagnostics in memory.
#[derive(Default)]
pub struct MemoryStorage {
    listings: Mutex<Vec<CanonicalListing>>,
    artifacts: Mutex<Vec<(String, Artifact)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listings(&self) -> Vec<CanonicalListing> {
        self.listings
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn artifact_keys(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .map(|a| a.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatasetSink for MemoryStorage {
    async fn push(&self, listing: &CanonicalListing) -> Result<()> {
        self.listings
            .lock()
            .map_err(AppError::storage)?
            .push(listing.clone());
        Ok(())
    }
}

#[async_trait]
impl DiagnosticSink for MemoryStorage {
    async fn save_artifact(&self, key: &str, artifact: &Artifact) -> Result<()> {
        self.artifacts
            .lock()
            .map_err(AppError::storage)?
            .push((key.to_string(), artifact.clone()));
        Ok(())
    }
}
