//! # Docuvault
//!
//! A thin augmentation layer over a document-store mapper:
//!
//! - **Transparent field-level encryption** backed by an external
//!   key-management service: data-encryption keys live in a key vault
//!   collection, their ids are cached per `(namespace, key name)`, and the
//!   [`field::EncryptedString`] type encrypts on write, decrypts on read,
//!   and encrypts equality-filter probes.
//! - **An async bridge** ([`aio`]) that runs the blocking document
//!   operations on worker threads.
//! - **Async lifecycle signals** ([`signals`]) with ordered,
//!   awaited-in-full pre/post-save delivery.
//!
//! ```no_run
//! use std::sync::Arc;
//! use docuvault::config::{AwsCredentials, EncryptionConfig};
//! use docuvault::field::{EncryptedString, FieldEncryption};
//! use docuvault::EncryptionAlgorithm;
//! use docuvault_store::MemoryStore;
//!
//! # fn main() -> docuvault::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let config = EncryptionConfig::new(
//!     AwsCredentials::new("AKIA...", "..."),
//!     "us-east-1",
//!     "encryption.__keyVault",
//!     "primary",
//! )?;
//! let encryption = FieldEncryption::configure_aws_kms(config, store);
//! let ssn = EncryptedString::new(EncryptionAlgorithm::Deterministic, encryption);
//!
//! let stored = ssn.to_store(Some("123456"))?;   // opaque binary
//! let probe = ssn.prepare_query_value("123456")?; // equals `stored`
//! # let _ = (stored, probe);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aio;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod field;
pub mod keyvault;
pub mod schema;
pub mod signals;

pub use cache::DataKeyCache;
pub use client::{ClientEncryption, ClientEncryptionPool};
pub use config::{AwsCredentials, EncryptionConfig};
pub use error::{Error, Result};
pub use field::{EncryptedString, FieldEncryption, StoredValue};
pub use keyvault::{create_data_key, get_data_key, prime_kms, DataKeyRecord};
pub use schema::DocumentSchema;
pub use signals::{DocumentSignals, Signal, SignalKwargs};

pub use docuvault_crypto::{
    EncryptionAlgorithm, HttpKms, KeyMaterial, KmsClient, LocalKms, MasterKeySpec, PrimedKms,
};
pub use docuvault_store::{
    Collection, Document, Filter, MemoryStore, Namespace, StoreClient, Value,
};
