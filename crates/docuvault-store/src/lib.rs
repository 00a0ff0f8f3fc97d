//! # Docuvault Store
//!
//! The document-store collaborator boundary used by the docuvault encryption
//! layer:
//! - Key namespaces (`database.collection`)
//! - A small typed document/value model
//! - Single-field equality filters
//! - `Collection` / `StoreClient` traits
//! - An in-memory backend for tests and embedding

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod namespace;
pub mod value;

pub use backend::memory::MemoryStore;
pub use backend::{Collection, IndexSpec, StoreClient};
pub use error::{StoreError, StoreResult};
pub use namespace::Namespace;
pub use value::{Document, Filter, Value};
