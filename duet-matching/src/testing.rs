//! Fixtures shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use duet_shared::store::{
    to_fields, DocKey, Document, Fields, MemoryStore, StoreError, StoreResult, TxnFn,
};
use duet_shared::DocumentStore;

use crate::models::{collections, AccountType, Profile};

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("fixture must be an object"),
    }
}

/// A visible single with nothing else set.
pub fn single(id: &str) -> Profile {
    Profile {
        id: id.to_string(),
        account_type: Some(AccountType::User),
        nickname: Some(id.to_uppercase()),
        ..Default::default()
    }
}

pub fn single_in(id: &str, country: &str) -> Profile {
    Profile {
        home_country_code: Some(country.to_string()),
        ..single(id)
    }
}

pub async fn seed(store: &MemoryStore, profiles: &[Profile]) {
    for profile in profiles {
        store
            .put(collections::PROFILES, &profile.id, to_fields(profile).unwrap(), false)
            .await
            .unwrap();
    }
}

/// Delegates to a memory store, optionally failing selected operations.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_puts: AtomicBool,
    pub fail_gets: AtomicBool,
    pub fail_transactions: AtomicBool,
}

fn down() -> StoreError {
    StoreError::Unavailable("connection reset".into())
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.get(collection, id).await
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> StoreResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.put(collection, id, fields, merge).await
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        self.inner.query_equals(collection, field, value).await
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        self.inner.query_array_contains(collection, field, value).await
    }

    async fn transact(&self, read_set: &[DocKey], op: &mut TxnFn<'_>) -> StoreResult<()> {
        if self.fail_transactions.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.transact(read_set, op).await
    }
}
