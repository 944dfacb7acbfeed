use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    array_contains, field_equals, merge_fields, DocKey, Document, DocumentStore, Fields,
    StoreError, StoreResult, Transaction, TxnFn,
};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct Entry {
    fields: Fields,
    version: u64,
}

/// In-process document store with optimistic, versioned transactions.
///
/// Every call yields to the scheduler once, and a transaction's commit is a
/// separate step from its reads, so concurrent callers on one runtime
/// interleave the same way they would against a remote store.
pub struct MemoryStore {
    docs: Mutex<HashMap<DocKey, Entry>>,
    max_attempts: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .map(|docs| docs.keys().filter(|k| k.collection == collection).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<DocKey, Entry>>> {
        self.docs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn read(&self, key: &DocKey) -> StoreResult<Option<Document>> {
        let docs = self.lock()?;
        let doc = docs
            .get(key)
            .map(|entry| Document::new(key.id.clone(), entry.fields.clone()));
        Ok(doc)
    }

    fn scan(&self, collection: &str, keep: impl Fn(&Fields) -> bool) -> StoreResult<Vec<Document>> {
        let docs = self.lock()?;
        let mut found: Vec<Document> = docs
            .iter()
            .filter(|(key, entry)| key.collection == collection && keep(&entry.fields))
            .map(|(key, entry)| Document::new(key.id.clone(), entry.fields.clone()))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let doc = self.read(&DocKey::new(collection, id))?;
        tokio::task::yield_now().await;
        Ok(doc)
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> StoreResult<()> {
        {
            let mut docs = self.lock()?;
            let key = DocKey::new(collection, id);
            match docs.get_mut(&key) {
                Some(entry) => {
                    if merge {
                        merge_fields(&mut entry.fields, fields);
                    } else {
                        entry.fields = fields;
                    }
                    entry.version += 1;
                }
                None => {
                    docs.insert(key, Entry { fields, version: 1 });
                }
            }
        }
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let found = self.scan(collection, |fields| field_equals(fields, field, value))?;
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let found = self.scan(collection, |fields| array_contains(fields, field, value))?;
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn transact(&self, read_set: &[DocKey], op: &mut TxnFn<'_>) -> StoreResult<()> {
        for attempt in 1..=self.max_attempts {
            let (snapshot, versions) = {
                let docs = self.lock()?;
                let mut snapshot = Vec::with_capacity(read_set.len());
                let mut versions = Vec::with_capacity(read_set.len());
                for key in read_set {
                    let entry = docs.get(key);
                    snapshot.push((
                        key.clone(),
                        entry.map(|e| Document::new(key.id.clone(), e.fields.clone())),
                    ));
                    versions.push((key.clone(), entry.map_or(0, |e| e.version)));
                }
                (snapshot, versions)
            };

            let mut txn = Transaction::new(snapshot);
            op(&mut txn)?;
            if !txn.has_writes() {
                return Ok(());
            }

            // Commit is a separate round trip.
            tokio::task::yield_now().await;

            {
                let mut docs = self.lock()?;
                let stale = versions
                    .iter()
                    .any(|(key, version)| docs.get(key).map_or(0, |e| e.version) != *version);
                if !stale {
                    for (key, doc) in txn.into_writes() {
                        let version = docs.get(&key).map_or(0, |e| e.version) + 1;
                        docs.insert(key, Entry { fields: doc.fields, version });
                    }
                    return Ok(());
                }
            }

            tracing::debug!(attempt, "memory store transaction conflict");
        }

        Err(StoreError::Conflict {
            attempts: self.max_attempts,
        })
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

    #[tokio::test]
    async fn put_merge_keeps_existing_fields() {
        let store = MemoryStore::new();
        store
            .put("profiles", "p1", fields(json!({ "a": 1, "b": 1 })), false)
            .await
            .unwrap();
        store
            .put("profiles", "p1", fields(json!({ "b": 2 })), true)
            .await
            .unwrap();

        let doc = store.get("profiles", "p1").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc.fields), json!({ "a": 1, "b": 2 }));
    }

    #[tokio::test]
    async fn put_without_merge_replaces() {
        let store = MemoryStore::new();
        store
            .put("profiles", "p1", fields(json!({ "a": 1 })), false)
            .await
            .unwrap();
        store
            .put("profiles", "p1", fields(json!({ "b": 2 })), false)
            .await
            .unwrap();

        let doc = store.get("profiles", "p1").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc.fields), json!({ "b": 2 }));
    }

    #[tokio::test]
    async fn queries_filter_by_collection_and_field() {
        let store = MemoryStore::new();
        store
            .put("likes", "a_b", fields(json!({ "fromProfileId": "a" })), true)
            .await
            .unwrap();
        store
            .put("likes", "b_a", fields(json!({ "fromProfileId": "b" })), true)
            .await
            .unwrap();
        store
            .put("matches", "a_b", fields(json!({ "profileIds": ["a", "b"] })), true)
            .await
            .unwrap();

        let from_a = store
            .query_equals("likes", "fromProfileId", &json!("a"))
            .await
            .unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].id, "a_b");

        let with_b = store
            .query_array_contains("matches", "profileIds", &json!("b"))
            .await
            .unwrap();
        assert_eq!(with_b.len(), 1);
        assert!(store
            .query_array_contains("matches", "profileIds", &json!("c"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn transaction_commits_writes() {
        let store = MemoryStore::new();
        let keys = [DocKey::new("matches", "a_b")];
        store
            .transact(&keys, &mut |txn: &mut Transaction| {
                if txn.get("matches", "a_b")?.is_none() {
                    txn.set("matches", "a_b", fields(json!({ "n": 1 })))?;
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(store.count("matches"), 1);
    }

    #[tokio::test]
    async fn failed_body_writes_nothing() {
        let store = MemoryStore::new();
        let keys = [DocKey::new("matches", "a_b")];
        let result = store
            .transact(&keys, &mut |txn: &mut Transaction| {
                txn.set("matches", "a_b", Fields::new())?;
                Err(StoreError::Unavailable("boom".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.count("matches"), 0);
    }

    #[tokio::test]
    async fn concurrent_transactions_retry_on_conflict() {
        let store = MemoryStore::new();
        let keys = [DocKey::new("counters", "c")];

        let increment = || {
            let keys = keys.clone();
            let store = &store;
            async move {
                store
                    .transact(&keys, &mut |txn: &mut Transaction| {
                        let current = txn
                            .get("counters", "c")?
                            .and_then(|d| d.get("n").and_then(Value::as_i64))
                            .unwrap_or(0);
                        txn.set("counters", "c", fields(json!({ "n": current + 1 })))
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(increment(), increment());
        a.unwrap();
        b.unwrap();

        let doc = store.get("counters", "c").await.unwrap().unwrap();
        assert_eq!(doc.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_conflict() {
        let store = MemoryStore::with_max_attempts(1);
        let keys = [DocKey::new("counters", "c")];

        let write = |n: i64| {
            let keys = keys.clone();
            let store = &store;
            async move {
                store
                    .transact(&keys, &mut |txn: &mut Transaction| {
                        txn.set("counters", "c", fields(json!({ "n": n })))
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(write(1), write(2));
        let (won, lost): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(Result::is_ok);
        assert_eq!(won.len(), 1);
        assert_eq!(lost.len(), 1);
        assert!(matches!(lost[0], Err(StoreError::Conflict { attempts: 1 })));
    }

    #[tokio::test]
    async fn read_only_transaction_never_conflicts() {
        let store = MemoryStore::with_max_attempts(1);
        store
            .put("counters", "c", fields(json!({ "n": 1 })), false)
            .await
            .unwrap();
        let keys = [DocKey::new("counters", "c")];

        let mut seen = None;
        let mut snapshot = |txn: &mut Transaction| -> StoreResult<()> {
            seen = txn.get("counters", "c")?.and_then(|d| d.get("n").cloned());
            Ok(())
        };
        let read = store.transact(&keys, &mut snapshot);
        let write = store.put("counters", "c", fields(json!({ "n": 2 })), false);

        let (read, write) = tokio::join!(read, write);
        read.unwrap();
        write.unwrap();
        assert!(seen.is_some());
    }
}
