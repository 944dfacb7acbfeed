//! Generic document store.
//!
//! The matching core only ever talks to a [`DocumentStore`]: point reads,
//! merge/replace writes, two query shapes and optimistic read-modify-write
//! transactions. [`MemoryStore`] backs tests and single-node deployments,
//! [`RedisDocumentStore`] backs shared deployments.

mod memory;
mod redis_store;
mod transaction;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::MemoryStore;
pub use redis_store::RedisDocumentStore;
pub use transaction::Transaction;

/// Top-level fields of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Retryable body of a transaction. It may run several times, so it must
/// only touch the [`Transaction`] and its own captured state.
pub type TxnFn<'a> = dyn FnMut(&mut Transaction) -> StoreResult<()> + Send + 'a;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("transaction aborted after {attempts} conflicting attempts")]
    Conflict { attempts: u32 },

    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("document {0} is not in the transaction read set")]
    Undeclared(DocKey),

    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    /// Transient failures: repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict { .. })
    }
}

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey {
    pub collection: String,
    pub id: String,
}

impl DocKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Decodes the fields into `T`, supplying the document id as `id` when
    /// the body does not carry one.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut fields = self.fields.clone();
        fields
            .entry("id")
            .or_insert_with(|| Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// Serializes `value` into document fields. Fails for non-object values.
pub fn to_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidDocument(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Shallow merge: incoming top-level fields overwrite existing ones.
pub(crate) fn merge_fields(existing: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}

pub(crate) fn field_equals(fields: &Fields, field: &str, value: &Value) -> bool {
    fields.get(field) == Some(value)
}

pub(crate) fn array_contains(fields: &Fields, field: &str, value: &Value) -> bool {
    matches!(fields.get(field), Some(Value::Array(items)) if items.contains(value))
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Writes `fields` to the document. With `merge` the fields are merged
    /// into an existing document (creating it if absent); without, the
    /// document is replaced.
    async fn put(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> StoreResult<()>;

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>>;

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>>;

    /// Runs `op` against a consistent snapshot of `read_set` and commits its
    /// writes atomically. If any read document changed before commit, `op`
    /// is run again on a fresh snapshot; once the attempts are exhausted the
    /// call fails with [`StoreError::Conflict`].
    async fn transact(&self, read_set: &[DocKey], op: &mut TxnFn<'_>) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        id: String,
        name: String,
    }

    #[test]
    fn decode_injects_document_id() {
        let doc = Document::new("p1", fields(json!({ "name": "Ana" })));
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "p1");
        assert_eq!(named.name, "Ana");
    }

    #[test]
    fn decode_keeps_body_id() {
        let doc = Document::new("key", fields(json!({ "id": "body", "name": "Ana" })));
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "body");
    }

    #[test]
    fn merge_overwrites_only_incoming_fields() {
        let mut existing = fields(json!({ "a": 1, "b": 2 }));
        merge_fields(&mut existing, fields(json!({ "b": 3, "c": 4 })));
        assert_eq!(Value::Object(existing), json!({ "a": 1, "b": 3, "c": 4 }));
    }

    #[test]
    fn array_membership_requires_an_array() {
        let doc = fields(json!({ "ids": ["a", "b"], "name": "a" }));
        assert!(array_contains(&doc, "ids", &json!("a")));
        assert!(!array_contains(&doc, "ids", &json!("c")));
        assert!(!array_contains(&doc, "name", &json!("a")));
        assert!(field_equals(&doc, "name", &json!("a")));
    }

    #[test]
    fn to_fields_rejects_scalars() {
        assert!(matches!(to_fields(&5), Err(StoreError::InvalidDocument(_))));
        assert!(to_fields(&json!({ "x": 1 })).is_ok());
    }

    #[test]
    fn retryable_errors() {
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(StoreError::Conflict { attempts: 3 }.is_retryable());
        assert!(!StoreError::Undeclared(DocKey::new("matches", "a_b")).is_retryable());
    }
}
