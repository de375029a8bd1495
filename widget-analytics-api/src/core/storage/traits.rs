//! Storage trait definitions
//!
//! The analytics document is always read and written whole. Backends only
//! need to know how to fetch the last persisted snapshot and how to replace
//! it; all record-level logic lives in [`crate::core::store::AnalyticsStore`].

use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::records::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed analytics document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Trait for analytics document backends
///
/// Implementations must be thread-safe (Send + Sync) as they are shared
/// across request handlers. `write` must be all-or-nothing: a failed write
/// leaves the previously persisted document readable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the persisted document, or `None` if nothing has been written yet
    async fn read(&self) -> Result<Option<Snapshot>, StorageError>;

    /// Replace the persisted document
    async fn write(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
