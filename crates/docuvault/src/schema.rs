//! Minimal document-schema seam.
//!
//! Just enough mapping for the encrypted field type to participate in a
//! real save/query path: a schema knows its namespace, its id, and how to
//! move between itself and a stored document. The blocking helpers here are
//! what the `aio` bridge wraps.

use crate::{Error, Result};
use docuvault_store::{Document, Filter, Namespace, StoreClient, Value};
use uuid::Uuid;

/// Mask rendered in place of hidden field values.
const HIDDEN_MASK: &str = "********";

/// A type stored as documents in one collection.
pub trait DocumentSchema: Sized + Send + Sync + 'static {
    /// Namespace the documents live in.
    fn namespace() -> Namespace;

    /// The document's `_id` value.
    fn id(&self) -> Value;

    /// Encodes into a stored document. Implementations run encrypted
    /// fields' write path here.
    fn to_document(&self) -> Result<Document>;

    /// Decodes from a stored document. Implementations run encrypted
    /// fields' read path here.
    fn from_document(doc: &Document) -> Result<Self>;

    /// Fields masked as `********` in display output.
    fn hidden_fields() -> &'static [&'static str] {
        &[]
    }

    /// Fields omitted from display output entirely.
    fn excluded_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Display encoding of a document: excluded fields removed, hidden fields
/// masked. For logs and outward-facing responses, never for storage.
pub fn to_display<T: DocumentSchema>(doc: &T) -> Result<Document> {
    let mut encoded = doc.to_document()?;
    for field in T::excluded_fields() {
        encoded.remove(field);
    }
    for field in T::hidden_fields() {
        if encoded.contains_field(field) {
            encoded.insert(*field, HIDDEN_MASK);
        }
    }
    Ok(encoded)
}

/// Generates a document id of the form `{prefix}{uuid}`, so ids are
/// self-describing about the collection they belong to.
#[must_use]
pub fn prefixed_uuid(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4())
}

/// Saves (upserts by `_id`) a document.
pub fn save<T: DocumentSchema>(store: &dyn StoreClient, doc: &T) -> Result<()> {
    let mut encoded = doc.to_document()?;
    if !encoded.contains_field("_id") {
        encoded.insert("_id", doc.id());
    }
    store.collection(&T::namespace()).save_one(encoded)?;
    Ok(())
}

/// Fetches a document by `_id`.
pub fn get<T: DocumentSchema>(store: &dyn StoreClient, id: impl Into<Value>) -> Result<Option<T>> {
    find_one(store, &Filter::eq("_id", id))
}

/// Fetches the first document matching the filter.
pub fn find_one<T: DocumentSchema>(
    store: &dyn StoreClient,
    filter: &Filter,
) -> Result<Option<T>> {
    store
        .collection(&T::namespace())
        .find_one(filter)?
        .map(|doc| T::from_document(&doc))
        .transpose()
}

/// Fetches all documents matching the filter.
pub fn find<T: DocumentSchema>(store: &dyn StoreClient, filter: &Filter) -> Result<Vec<T>> {
    store
        .collection(&T::namespace())
        .find(filter)?
        .iter()
        .map(T::from_document)
        .collect()
}

/// Counts the schema's documents.
pub fn count<T: DocumentSchema>(store: &dyn StoreClient) -> Result<u64> {
    Ok(store.collection(&T::namespace()).count()?)
}

/// Fetches the raw stored document, bypassing the schema's decoding (and
/// therefore any field decryption).
pub fn raw<T: DocumentSchema>(
    store: &dyn StoreClient,
    id: impl Into<Value>,
) -> Result<Option<Document>> {
    Ok(store
        .collection(&T::namespace())
        .find_one(&Filter::eq("_id", id))?)
}

/// Convenience for `from_document` implementations: a required string
/// field.
pub fn require_string(doc: &Document, field: &str) -> Result<String> {
    match doc.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(Error::Codec(format!(
            "expected string for {field}, got {other:?}"
        ))),
    }
}
