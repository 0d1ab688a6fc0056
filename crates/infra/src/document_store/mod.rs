//! Document store seam.
//!
//! Records are JSON objects addressed by `(collection, id)`. Writes may ask the
//! store to stamp fields with its own clock ("server timestamps").

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

/// A stored document.
pub type Document = Map<String, Value>;

/// Store-reported failure. `Display` is the store's message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No document at the given path (update of a missing record).
    #[error("{0}")]
    NotFound(String),

    /// The store could not be reached.
    #[error("{0}")]
    Unavailable(String),

    /// The store rejected or failed the write.
    #[error("{0}")]
    Write(String),

    /// A document could not be encoded or decoded.
    #[error("{0}")]
    Codec(String),
}

/// Operations of [`DocumentStore`], used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    Update,
    Get,
}

/// Fields to write plus the fields the store should stamp with its own time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    pub fields: Document,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a serializable value; it must serialize to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(fields)) => Ok(Self {
                fields,
                server_timestamps: Vec::new(),
            }),
            Ok(other) => Err(StoreError::Codec(format!(
                "document must be a JSON object, got {other}"
            ))),
            Err(e) => Err(StoreError::Codec(e.to_string())),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamps.push(field.into());
        self
    }
}

/// Document store contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or replace the document.
    async fn put(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError>;

    /// Merge fields into an existing document; [`StoreError::NotFound`] if absent.
    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
}

pub(crate) fn missing_document(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound(format!("No document to update: {collection}/{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
    }

    #[test]
    fn builder_collects_fields_and_timestamps() {
        let write = DocumentWrite::from_serialize(&Sample { name: "x" })
            .unwrap()
            .set("isActive", false)
            .server_timestamp("updatedAt");

        assert_eq!(write.fields.get("name"), Some(&Value::from("x")));
        assert_eq!(write.fields.get("isActive"), Some(&Value::from(false)));
        assert_eq!(write.server_timestamps, vec!["updatedAt".to_string()]);
    }

    #[test]
    fn non_object_values_are_rejected() {
        assert!(matches!(
            DocumentWrite::from_serialize(&42),
            Err(StoreError::Codec(_))
        ));
    }
}
