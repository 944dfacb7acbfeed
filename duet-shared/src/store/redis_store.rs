use async_trait::async_trait;
use serde_json::Value;

use super::{
    array_contains, field_equals, merge_fields, DocKey, Document, DocumentStore, Fields,
    StoreError, StoreResult, Transaction, TxnFn,
};
use crate::clients::redis::{CasEntry, RedisClient};

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Document store on Redis.
///
/// Each document is one JSON string at `{prefix}:doc:{collection}:{id}`;
/// `{prefix}:idx:{collection}` is the set of ids used to answer queries.
/// Writes go through an atomic compare-and-set script, so puts and
/// transactions are both optimistic and retried on conflict.
#[derive(Clone)]
pub struct RedisDocumentStore {
    client: RedisClient,
    prefix: String,
    max_attempts: u32,
}

impl RedisDocumentStore {
    pub fn new(client: RedisClient, prefix: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    async fn scan(
        &self,
        collection: &str,
        keep: impl Fn(&Fields) -> bool,
    ) -> StoreResult<Vec<Document>> {
        let mut ids = self.client.smembers(&index_key(&self.prefix, collection)).await?;
        ids.sort();
        let keys: Vec<String> = ids
            .iter()
            .map(|id| doc_key(&self.prefix, collection, id))
            .collect();
        let raws = self.client.mget(&keys).await?;
        Ok(collect_documents(collection, ids, raws, keep))
    }
}

fn doc_key(prefix: &str, collection: &str, id: &str) -> String {
    format!("{prefix}:doc:{collection}:{id}")
}

fn index_key(prefix: &str, collection: &str) -> String {
    format!("{prefix}:idx:{collection}")
}

fn parse_fields(raw: &str) -> StoreResult<Fields> {
    Ok(serde_json::from_str(raw)?)
}

/// Query results from an index scan. Ids whose document is gone or is not
/// a JSON object are skipped.
fn collect_documents(
    collection: &str,
    ids: Vec<String>,
    raws: Vec<Option<String>>,
    keep: impl Fn(&Fields) -> bool,
) -> Vec<Document> {
    let mut found = Vec::new();
    for (id, raw) in ids.into_iter().zip(raws) {
        let Some(raw) = raw else { continue };
        let fields = match parse_fields(&raw) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(collection, id = %id, error = %e, "skipping malformed document");
                continue;
            }
        };
        if keep(&fields) {
            found.push(Document::new(id, fields));
        }
    }
    found
}

/// Body to write for a put over the `current` raw document.
fn put_body(current: Option<&str>, fields: Fields, merge: bool) -> StoreResult<String> {
    let next = match current {
        Some(raw) if merge => {
            let mut existing = parse_fields(raw)?;
            merge_fields(&mut existing, fields);
            existing
        }
        _ => fields,
    };
    Ok(serde_json::to_string(&next)?)
}

fn snapshot(
    read_set: &[DocKey],
    raws: &[Option<String>],
) -> StoreResult<Vec<(DocKey, Option<Document>)>> {
    read_set
        .iter()
        .zip(raws)
        .map(|(key, raw)| {
            let doc = match raw {
                Some(raw) => Some(Document::new(key.id.clone(), parse_fields(raw)?)),
                None => None,
            };
            Ok((key.clone(), doc))
        })
        .collect()
}

/// One compare-and-set slot per read-set document. Every slot checks the
/// value read at snapshot time; only written documents carry a new value.
fn commit_entries(
    prefix: &str,
    read_set: &[DocKey],
    raws: Vec<Option<String>>,
    mut writes: Vec<(DocKey, Document)>,
) -> StoreResult<Vec<CasEntry>> {
    let mut entries = Vec::with_capacity(read_set.len());
    for (key, raw) in read_set.iter().zip(raws) {
        let new_value = match writes.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                let (_, doc) = writes.swap_remove(pos);
                Some(serde_json::to_string(&doc.fields)?)
            }
            None => None,
        };
        entries.push(CasEntry {
            key: doc_key(prefix, &key.collection, &key.id),
            index_key: index_key(prefix, &key.collection),
            member: key.id.clone(),
            expected: raw,
            new_value,
        });
    }
    Ok(entries)
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let raw = self.client.get(&doc_key(&self.prefix, collection, id)).await?;
        raw.map(|raw| Ok(Document::new(id, parse_fields(&raw)?)))
            .transpose()
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> StoreResult<()> {
        let key = DocKey::new(collection, id);
        let redis_key = doc_key(&self.prefix, collection, id);
        for attempt in 1..=self.max_attempts {
            let current = self.client.get(&redis_key).await?;
            let body = put_body(current.as_deref(), fields.clone(), merge)?;
            let entry = CasEntry {
                key: redis_key.clone(),
                index_key: index_key(&self.prefix, collection),
                member: id.to_string(),
                expected: current,
                new_value: Some(body),
            };
            if self.client.compare_and_set(&[entry]).await? {
                return Ok(());
            }
            tracing::debug!(attempt, document = %key, "redis put lost a race, retrying");
        }
        Err(StoreError::Conflict {
            attempts: self.max_attempts,
        })
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        self.scan(collection, |fields| field_equals(fields, field, value))
            .await
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        self.scan(collection, |fields| array_contains(fields, field, value))
            .await
    }

    async fn transact(&self, read_set: &[DocKey], op: &mut TxnFn<'_>) -> StoreResult<()> {
        let keys: Vec<String> = read_set
            .iter()
            .map(|key| doc_key(&self.prefix, &key.collection, &key.id))
            .collect();

        for attempt in 1..=self.max_attempts {
            let raws = self.client.mget(&keys).await?;

            let mut txn = Transaction::new(snapshot(read_set, &raws)?);
            op(&mut txn)?;
            if !txn.has_writes() {
                return Ok(());
            }

            let entries = commit_entries(&self.prefix, read_set, raws, txn.into_writes())?;
            if self.client.compare_and_set(&entries).await? {
                return Ok(());
            }
            tracing::debug!(attempt, "redis transaction conflict");
        }

        Err(StoreError::Conflict {
            attempts: self.max_attempts,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(self.client.ping().await?)
    }
}
