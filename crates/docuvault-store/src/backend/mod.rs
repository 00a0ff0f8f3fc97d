//! Store client traits and index specifications.

pub mod memory;

use crate::{Document, Filter, Namespace, StoreResult};
use std::sync::Arc;

/// A handle to a single collection of documents.
///
/// All operations are blocking; asynchronous callers go through the
/// `docuvault::aio` bridge rather than an async trait here.
pub trait Collection: Send + Sync {
    /// Finds the first document matching the filter.
    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Finds all documents matching the filter, in insertion order.
    fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Counts all documents in the collection.
    fn count(&self) -> StoreResult<u64>;

    /// Inserts a new document. Fails if `_id` is missing, if a document with
    /// the same `_id` exists, or if a unique index rejects it.
    fn insert_one(&self, doc: Document) -> StoreResult<()>;

    /// Upserts by `_id`: replaces the document with the same `_id` or
    /// inserts if none exists. Unique indexes are still enforced against
    /// other documents.
    fn save_one(&self, doc: Document) -> StoreResult<()>;

    /// Creates an index if an identical one does not already exist.
    fn create_index(&self, spec: IndexSpec) -> StoreResult<()>;
}

/// A connection to a document store, handing out collection handles.
pub trait StoreClient: Send + Sync {
    /// Returns the collection for the given namespace, creating it lazily
    /// where the backend supports that.
    fn collection(&self, namespace: &Namespace) -> Arc<dyn Collection>;
}

/// A single-field index specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Indexed field.
    pub field: String,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Restrict the index to documents where the field exists, so documents
    /// without the field are not treated as duplicates of each other.
    pub partial_filter_exists: bool,
}

impl IndexSpec {
    /// Builds a unique index on `field`.
    pub fn unique(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            unique: true,
            partial_filter_exists: false,
        }
    }

    /// Scopes the index to documents where the field exists.
    #[must_use]
    pub fn partial_filter_exists(mut self) -> Self {
        self.partial_filter_exists = true;
        self
    }
}
