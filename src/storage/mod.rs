//! Output collaborators: the dataset and the diagnostic key-value store.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── datasets/
//! │   └── default.jsonl     # One canonical listing per line, append-only
//! └── key_value_store/
//!     ├── SUMMARY.json      # Last run summary
//!     ├── wrong-page-1-1718000000000.html
//!     └── debug-page-3-1718000000000.html
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CanonicalListing;
use crate::render::Artifact;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Append-only, ordered output channel for accepted records.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn push(&self, listing: &CanonicalListing) -> Result<()>;
}

/// Persists diagnostic artifacts under a key; the content is never interpreted.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn save_artifact(&self, key: &str, artifact: &Artifact) -> Result<()>;
}
