//! Read-modify-write access to the analytics document.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::ids::generate_id;
use crate::core::storage::{DocumentStore, StorageError};
use crate::models::input::{ChatMessageInput, NewRecord, SessionInput, VisitorInput};
use crate::models::records::{ChatMessage, Session, Snapshot, Visitor};

impl Snapshot {
    /// Insert-or-update keyed by `sessionId`. Returns the stored visitor.
    pub fn upsert_visitor(&mut self, input: VisitorInput, now: DateTime<Utc>) -> &Visitor {
        let session_id = input.session_id.clone().unwrap_or_default();

        let index = match self
            .visitors
            .iter()
            .position(|v| v.profile.session_id == session_id)
        {
            Some(index) => {
                let visitor = &mut self.visitors[index];
                input.merge_into(&mut visitor.profile);
                visitor.last_seen = now;
                index
            },
            None => {
                self.visitors.push(Visitor {
                    id: generate_id(),
                    profile: input.sanitize(now),
                    last_seen: now,
                });
                self.visitors.len() - 1
            },
        };

        &self.visitors[index]
    }

    pub fn append_message(&mut self, input: ChatMessageInput, now: DateTime<Utc>) -> &ChatMessage {
        self.chat_messages.push(ChatMessage {
            id: generate_id(),
            body: input.sanitize(),
            timestamp: now,
        });
        &self.chat_messages[self.chat_messages.len() - 1]
    }

    pub fn append_session(&mut self, input: SessionInput, now: DateTime<Utc>) -> &Session {
        self.sessions.push(Session {
            id: generate_id(),
            body: input.sanitize(now),
            timestamp: now,
        });
        &self.sessions[self.sessions.len() - 1]
    }

    pub fn apply(&mut self, record: NewRecord, now: DateTime<Utc>) {
        match record {
            NewRecord::Visitor(input) => {
                self.upsert_visitor(input, now);
            },
            NewRecord::Message(input) => {
                self.append_message(input, now);
            },
            NewRecord::Session(input) => {
                self.append_session(input, now);
            },
        }
    }
}

/// Owns the analytics document behind an injected [`DocumentStore`].
///
/// Every mutation is a full load, modify, save cycle serialized by an async
/// mutex, so concurrent requests within one process never lose updates.
/// Separate processes sharing the same backend are not coordinated.
pub struct AnalyticsStore {
    backend: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl AnalyticsStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Current document. An uninitialized backend is seeded with an empty
    /// document, which is persisted before it is returned.
    pub async fn load(&self) -> Result<Snapshot, StorageError> {
        if let Some(snapshot) = self.backend.read().await? {
            return Ok(snapshot);
        }

        let _guard = self.write_lock.lock().await;
        self.load_or_init().await
    }

    /// Stamps `lastUpdated` and replaces the persisted document.
    pub async fn save(&self, snapshot: &mut Snapshot) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.stamp_and_write(snapshot).await
    }

    /// Validated record in, updated document out.
    pub async fn record(&self, record: NewRecord) -> Result<Snapshot, StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.load_or_init().await?;
        let kind = record.kind();
        snapshot.apply(record, Utc::now());
        self.stamp_and_write(&mut snapshot).await?;

        debug!(
            "Recorded {} ({} visitors, {} messages, {} sessions)",
            kind,
            snapshot.visitors.len(),
            snapshot.chat_messages.len(),
            snapshot.sessions.len()
        );
        Ok(snapshot)
    }

    /// Empties all three collections and persists immediately.
    pub async fn clear(&self) -> Result<Snapshot, StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = Snapshot::empty(Utc::now());
        self.stamp_and_write(&mut snapshot).await?;
        info!("Cleared analytics document ({} backend)", self.backend.name());
        Ok(snapshot)
    }

    async fn load_or_init(&self) -> Result<Snapshot, StorageError> {
        match self.backend.read().await? {
            Some(snapshot) => Ok(snapshot),
            None => {
                let mut snapshot = Snapshot::empty(Utc::now());
                self.stamp_and_write(&mut snapshot).await?;
                info!(
                    "Initialized empty analytics document ({} backend)",
                    self.backend.name()
                );
                Ok(snapshot)
            },
        }
    }

    async fn stamp_and_write(&self, snapshot: &mut Snapshot) -> Result<(), StorageError> {
        snapshot.last_updated = Utc::now();
        self.backend.write(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{FileDocumentStore, InMemoryDocumentStore, MockDocumentStore};
    use crate::models::input::RecordKind;
    use crate::models::records::Sender;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_store() -> AnalyticsStore {
        AnalyticsStore::new(Arc::new(InMemoryDocumentStore::new()))
    }

    fn visitor(data: serde_json::Value) -> NewRecord {
        NewRecord::parse(RecordKind::Visitor, data).unwrap()
    }

    #[test]
    fn test_upsert_existing_session_keeps_count() {
        let now = Utc::now();
        let mut snapshot = Snapshot::empty(now);

        let first_id = snapshot
            .upsert_visitor(
                VisitorInput {
                    session_id: Some("s1".to_string()),
                    page_views: Some(1),
                    ..Default::default()
                },
                now,
            )
            .id
            .clone();
        assert_eq!(snapshot.visitors.len(), 1);

        let later = now + chrono::Duration::minutes(3);
        let updated = snapshot.upsert_visitor(
            VisitorInput {
                session_id: Some("s1".to_string()),
                page_views: Some(4),
                ..Default::default()
            },
            later,
        );
        assert_eq!(updated.id, first_id);
        assert_eq!(updated.profile.page_views, 4);
        assert_eq!(updated.last_seen, later);
        assert_eq!(updated.profile.created_at, now);
        assert_eq!(snapshot.visitors.len(), 1);
    }

    #[test]
    fn test_upsert_new_session_appends() {
        let now = Utc::now();
        let mut snapshot = Snapshot::empty(now);

        for (i, session) in ["a", "b", "c"].iter().enumerate() {
            snapshot.upsert_visitor(
                VisitorInput {
                    session_id: Some(session.to_string()),
                    ..Default::default()
                },
                now,
            );
            assert_eq!(snapshot.visitors.len(), i + 1);
        }
    }

    #[test]
    fn test_append_message_stamps_timestamp() {
        let now = Utc::now();
        let mut snapshot = Snapshot::empty(now);

        let message = snapshot.append_message(
            ChatMessageInput {
                session_id: Some("s1".to_string()),
                sender: Some("agent".to_string()),
                message: Some("Hello!".to_string()),
                ..Default::default()
            },
            now,
        );
        assert_eq!(message.timestamp, now);
        assert_eq!(message.body.sender, Sender::Agent);
        assert!(!message.id.is_empty());
    }

    #[tokio::test]
    async fn test_load_initializes_and_persists() {
        let backend = Arc::new(InMemoryDocumentStore::new());
        let store = AnalyticsStore::new(backend.clone());

        let snapshot = store.load().await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(backend.read().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_record_then_load() {
        let store = memory_store();

        store
            .record(visitor(json!({
                "sessionId": "s1",
                "deviceType": "Mobile",
                "os": "iOS",
                "browser": "Safari"
            })))
            .await
            .unwrap();

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.visitors.len(), 1);
        assert_eq!(snapshot.visitors[0].profile.device_type, "Mobile");
    }

    #[tokio::test]
    async fn test_save_stamps_last_updated() {
        let store = memory_store();
        let mut snapshot = store.load().await.unwrap();
        let before = snapshot.last_updated;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.save(&mut snapshot).await.unwrap();

        assert!(snapshot.last_updated > before);
        assert_eq!(store.load().await.unwrap().last_updated, snapshot.last_updated);
    }

    #[tokio::test]
    async fn test_clear_then_load_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = AnalyticsStore::new(Arc::new(FileDocumentStore::new(
            dir.path().join("analytics.json"),
        )));

        store
            .record(
                NewRecord::parse(
                    RecordKind::Session,
                    json!({ "sessionId": "s1", "startTime": "2024-05-01T10:00:00Z" }),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().sessions.len(), 1);

        store.clear().await.unwrap();

        let snapshot = store.load().await.unwrap();
        assert!(snapshot.visitors.is_empty());
        assert!(snapshot.chat_messages.is_empty());
        assert!(snapshot.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let store = Arc::new(memory_store());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .record(visitor(json!({
                            "sessionId": format!("s{i}"),
                            "deviceType": "Desktop",
                            "os": "Linux",
                            "browser": "Firefox"
                        })))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().visitors.len(), 20);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let mut backend = MockDocumentStore::new();
        backend
            .expect_read()
            .returning(|| Ok(Some(Snapshot::empty(Utc::now()))));
        backend
            .expect_write()
            .times(1)
            .returning(|_| Err(StorageError::Unavailable("disk full".to_string())));
        backend.expect_name().return_const("mock");

        let store = AnalyticsStore::new(Arc::new(backend));
        let result = store
            .record(visitor(json!({
                "sessionId": "s1",
                "deviceType": "Mobile",
                "os": "iOS",
                "browser": "Safari"
            })))
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_read_failure_aborts_record() {
        let mut backend = MockDocumentStore::new();
        backend
            .expect_read()
            .returning(|| Err(StorageError::Unavailable("offline".to_string())));
        backend.expect_write().never();
        backend.expect_name().return_const("mock");

        let store = AnalyticsStore::new(Arc::new(backend));
        let result = store
            .record(visitor(json!({
                "sessionId": "s1",
                "deviceType": "Mobile",
                "os": "iOS",
                "browser": "Safari"
            })))
            .await;

        assert!(result.is_err());
    }
}
