//! In-memory storage implementation
//!
//! Keeps the document in process memory. Data is lost when the process exits.
//! Suitable for tests and throwaway single-instance deployments.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::models::records::Snapshot;

use super::traits::{DocumentStore, StorageError};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    document: RwLock<Option<Snapshot>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document instead of an uninitialized store
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            document: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read(&self) -> Result<Option<Snapshot>, StorageError> {
        Ok(self.document.read().clone())
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        *self.document.write() = Some(snapshot.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
