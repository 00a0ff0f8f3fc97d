//! In-memory store backend.
//!
//! Backs tests and embedded use. Unique-index semantics follow the document
//! store this boundary abstracts: `_id` is always unique, a unique index on
//! an array field treats each element as an indexed value, and a
//! partial-filter-exists index skips documents without the field.

use crate::backend::{Collection, IndexSpec, StoreClient};
use crate::{Document, Filter, Namespace, StoreError, StoreResult, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An in-process document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Namespace, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreClient for MemoryStore {
    fn collection(&self, namespace: &Namespace) -> Arc<dyn Collection> {
        let mut collections = self.collections.write();
        let coll = collections
            .entry(namespace.clone())
            .or_insert_with(|| {
                debug!(namespace = %namespace, "creating in-memory collection");
                Arc::new(MemoryCollection::default())
            })
            .clone();
        coll
    }
}

#[derive(Default)]
struct MemoryCollection {
    docs: RwLock<Vec<Document>>,
    indexes: RwLock<Vec<IndexSpec>>,
}

/// Values a document contributes to an index on `field`: each array element
/// for array fields, the scalar itself otherwise, nothing if absent.
fn indexed_values<'a>(doc: &'a Document, field: &str) -> Vec<&'a Value> {
    match doc.get(field) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v) => vec![v],
        None => Vec::new(),
    }
}

/// Checks `doc` against every unique index over the given document set.
/// Callers must hold the write lock on `docs` so the check and the
/// subsequent insert are atomic.
fn check_unique(
    indexes: &[IndexSpec],
    docs: &[Document],
    doc: &Document,
    exclude_id: Option<&Value>,
) -> StoreResult<()> {
    for index in indexes.iter().filter(|i| i.unique) {
        let new_values = indexed_values(doc, &index.field);
        if new_values.is_empty() {
            // Partial-filter-exists indexes ignore documents without
            // the field; a full unique index over absent values would
            // collide on null, which nothing in this layer relies on.
            continue;
        }
        for existing in docs {
            if let (Some(id), Some(existing_id)) = (exclude_id, existing.get("_id")) {
                if id == existing_id {
                    continue;
                }
            }
            let existing_values = indexed_values(existing, &index.field);
            if new_values.iter().any(|v| existing_values.contains(v)) {
                return Err(StoreError::DuplicateKey {
                    index: index.field.clone(),
                });
            }
        }
    }
    Ok(())
}

impl Collection for MemoryCollection {
    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.docs.read().iter().find(|d| filter.matches(d)).cloned())
    }

    fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self
            .docs
            .read()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.docs.read().len() as u64)
    }

    fn insert_one(&self, doc: Document) -> StoreResult<()> {
        let id = doc.get("_id").ok_or(StoreError::MissingId)?.clone();
        let indexes = self.indexes.read();
        let mut docs = self.docs.write();
        if docs.iter().any(|d| d.get("_id") == Some(&id)) {
            return Err(StoreError::DuplicateKey {
                index: "_id".to_string(),
            });
        }
        check_unique(&indexes, &docs, &doc, None)?;
        docs.push(doc);
        Ok(())
    }

    fn save_one(&self, doc: Document) -> StoreResult<()> {
        let id = doc.get("_id").ok_or(StoreError::MissingId)?.clone();
        let indexes = self.indexes.read();
        let mut docs = self.docs.write();
        check_unique(&indexes, &docs, &doc, Some(&id))?;
        if let Some(existing) = docs.iter_mut().find(|d| d.get("_id") == Some(&id)) {
            *existing = doc;
        } else {
            docs.push(doc);
        }
        Ok(())
    }

    fn create_index(&self, spec: IndexSpec) -> StoreResult<()> {
        let mut indexes = self.indexes.write();
        if !indexes.contains(&spec) {
            debug!(field = %spec.field, unique = spec.unique, "creating index");
            indexes.push(spec);
        }
        Ok(())
    }
}
