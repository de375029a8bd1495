//! JSON file backend
//!
//! The document is written to a sibling `.tmp` file and renamed over the
//! target, so readers only ever see a complete document.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::records::Snapshot;

use super::traits::{DocumentStore, StorageError};

pub struct FileDocumentStore {
    path: PathBuf,
}

impl FileDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "analytics.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn read(&self) -> Result<Option<Snapshot>, StorageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };

        let snapshot = serde_json::from_slice(&raw)?;
        debug!("Read analytics document from {}", self.path.display());
        Ok(Some(snapshot))
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(parent, e))?;
        }

        let payload = serde_json::to_vec_pretty(snapshot)?;
        let temp_path = self.temp_path();

        if let Err(e) = tokio::fs::write(&temp_path, &payload).await {
            return Err(Self::io_error(&temp_path, e));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                warn!(
                    "Failed to remove temporary file {}: {}",
                    temp_path.display(),
                    cleanup
                );
            }
            return Err(Self::io_error(&self.path, e));
        }

        debug!(
            "Wrote analytics document ({} bytes) to {}",
            payload.len(),
            self.path.display()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
