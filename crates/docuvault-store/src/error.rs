//! Store error types.

use thiserror::Error;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Namespace string did not split into `database.collection`.
    #[error("invalid namespace {0:?}: expected \"database.collection\"")]
    InvalidNamespace(String),

    /// A unique index rejected the write.
    #[error("duplicate key for unique index on {index:?}")]
    DuplicateKey {
        /// Field the violated index covers.
        index: String,
    },

    /// Document is missing its `_id` field.
    #[error("document has no _id field")]
    MissingId,

    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
