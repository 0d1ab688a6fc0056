//! In-memory document store for tests/dev.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{missing_document, Document, DocumentStore, DocumentWrite, StoreError, StoreOp};
use crate::faults::FaultInjector;

type Key = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<Key, Document>>,
    faults: FaultInjector<StoreOp>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault table for this store (tests).
    pub fn faults(&self) -> &FaultInjector<StoreOp> {
        &self.faults
    }

    /// Snapshot of one document, bypassing injected faults.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.read()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.read().keys().filter(|(c, _)| c == collection).count()
    }

    async fn inject(&self, op: StoreOp) -> Result<(), StoreError> {
        self.faults.check(op).await.map_err(StoreError::Write)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Key, Document>> {
        self.docs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Key, Document>> {
        self.docs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn stamp(doc: &mut Document, write: DocumentWrite, now: DateTime<Utc>) {
    doc.extend(write.fields);
    for field in write.server_timestamps {
        doc.insert(field, Value::String(now.to_rfc3339()));
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError> {
        self.inject(StoreOp::Put).await?;

        let mut doc = Document::new();
        stamp(&mut doc, write, Utc::now());
        self.write()
            .insert((collection.to_string(), id.to_string()), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError> {
        self.inject(StoreOp::Update).await?;

        let mut docs = self.write();
        let doc = docs
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| missing_document(collection, id))?;
        stamp(doc, write, Utc::now());
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inject(StoreOp::Get).await?;

        Ok(self.document(collection, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_replaces_and_stamps_timestamps() {
        let store = InMemoryDocumentStore::new();
        store
            .put(
                "users",
                "u1",
                DocumentWrite::new()
                    .set("name", "Ann")
                    .set("stale", true)
                    .server_timestamp("createdAt"),
            )
            .await
            .unwrap();
        store
            .put("users", "u1", DocumentWrite::new().set("name", "Bea"))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&Value::from("Bea")));
        assert!(doc.get("stale").is_none());
        assert!(doc.get("createdAt").is_none());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .put("users", "u1", DocumentWrite::new().set("name", "Ann").set("isActive", true))
            .await
            .unwrap();
        store
            .update(
                "users",
                "u1",
                DocumentWrite::new()
                    .set("isActive", false)
                    .server_timestamp("updatedAt"),
            )
            .await
            .unwrap();

        let doc = store.document("users", "u1").unwrap();
        assert_eq!(doc.get("name"), Some(&Value::from("Ann")));
        assert_eq!(doc.get("isActive"), Some(&Value::from(false)));
        let stamped = doc.get("updatedAt").and_then(Value::as_str).unwrap();
        assert!(DateTime::parse_from_rfc3339(stamped).is_ok());
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update("users", "ghost", DocumentWrite::new().set("isActive", true))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("No document to update: users/ghost".into()));
        assert_eq!(store.count("users"), 0);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryDocumentStore::new();
        store.put("users", "x", DocumentWrite::new()).await.unwrap();
        assert!(store.get("patients", "x").await.unwrap().is_none());
        assert_eq!(store.count("users"), 1);
    }
}
