//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── datasets/{name}.jsonl       # Dataset: JSON lines, appended in order
//! └── key_value_store/{key}.{ext} # Diagnostics and the run summary
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::CanonicalListing;
use crate::render::Artifact;
use crate::storage::{DatasetSink, DiagnosticSink};

const DATASETS_DIR: &str = "datasets";
const KV_STORE_DIR: &str = "key_value_store";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    dataset_name: String,
    /// Serializes appends so concurrent workers never interleave lines
    append_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, dataset_name: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            dataset_name: dataset_name.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path of the JSON-lines dataset file.
    pub fn dataset_path(&self) -> PathBuf {
        self.root_dir
            .join(DATASETS_DIR)
            .join(format!("{}.jsonl", self.dataset_name))
    }

    /// Path of a key-value store record.
    pub fn record_path(&self, key: &str, extension: &str) -> PathBuf {
        self.root_dir
            .join(KV_STORE_DIR)
            .join(format!("{key}.{extension}"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write a JSON record to the key-value store.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(&self.record_path(key, "json"), &bytes)
            .await
    }

    /// Read the dataset back; a missing file is an empty dataset.
    pub async fn read_dataset(&self) -> Result<Vec<CanonicalListing>> {
        let content = match tokio::fs::read_to_string(self.dataset_path()).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AppError::from))
            .collect()
    }
}

#[async_trait]
impl DatasetSink for LocalStorage {
    async fn push(&self, listing: &CanonicalListing) -> Result<()> {
        let mut line = serde_json::to_vec(listing)?;
        line.push(b'\n');

        let path = self.dataset_path();
        let _guard = self.append_lock.lock().await;
        self.ensure_dir(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AppError::storage(format!("open {}: {e}", path.display())))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl DiagnosticSink for LocalStorage {
    async fn save_artifact(&self, key: &str, artifact: &Artifact) -> Result<()> {
        let path = self.record_path(key, &artifact.extension);
        self.write_bytes(&path, &artifact.bytes).await?;
        log::info!("Saved diagnostic {}", path.display());
        Ok(())
    }
}
