use std::collections::{BTreeMap, BTreeSet};

use super::{merge_fields, DocKey, Document, Fields, StoreError, StoreResult};

/// Working view of one transaction attempt.
///
/// Reads see the snapshot taken for the declared read set plus any writes
/// already buffered in this attempt. Writes are only applied by the store
/// at commit.
#[derive(Debug, Default)]
pub struct Transaction {
    view: BTreeMap<DocKey, Option<Document>>,
    dirty: BTreeSet<DocKey>,
}

impl Transaction {
    pub fn new(snapshot: impl IntoIterator<Item = (DocKey, Option<Document>)>) -> Self {
        Self {
            view: snapshot.into_iter().collect(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let key = DocKey::new(collection, id);
        self.view
            .get(&key)
            .cloned()
            .ok_or(StoreError::Undeclared(key))
    }

    /// Replaces the document, creating it if absent.
    pub fn set(&mut self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let key = self.declared(collection, id)?;
        self.view
            .insert(key.clone(), Some(Document::new(id, fields)));
        self.dirty.insert(key);
        Ok(())
    }

    /// Merges `fields` into an existing document.
    pub fn update(&mut self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let key = self.declared(collection, id)?;
        match self.view.get_mut(&key) {
            Some(Some(doc)) => merge_fields(&mut doc.fields, fields),
            _ => {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
        }
        self.dirty.insert(key);
        Ok(())
    }

    pub fn has_writes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Final state of every document written in this attempt.
    pub fn into_writes(mut self) -> Vec<(DocKey, Document)> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|key| {
                let doc = self.view.remove(&key).flatten()?;
                Some((key, doc))
            })
            .collect()
    }

    fn declared(&self, collection: &str, id: &str) -> StoreResult<DocKey> {
        let key = DocKey::new(collection, id);
        if self.view.contains_key(&key) {
            Ok(key)
        } else {
            Err(StoreError::Undeclared(key))
        }
    }
}
