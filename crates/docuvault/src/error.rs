//! Error types for the encryption layer.
//!
//! Collaborator failures (store, key-management service) pass through
//! unchanged via `#[from]`; the one domain-specific error this layer adds is
//! [`Error::NoDataKeyFound`].

use docuvault_crypto::CryptoError;
use docuvault_store::StoreError;
use thiserror::Error;

/// Errors raised by the encryption layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed namespace, missing credential, or other invalid
    /// configuration. Not recoverable; never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// No data-encryption-key record matches the requested name or id.
    /// Recoverable by provisioning the key, not by retrying the read.
    #[error("no data key found for {key_name:?}")]
    NoDataKeyFound {
        /// The key alt-name (or id) that was looked up.
        key_name: String,
    },

    /// Document could not be decoded into the expected shape.
    #[error("document codec error: {0}")]
    Codec(String),

    /// Failure from the document store, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Failure from the cipher or key-management client, passed through
    /// unchanged.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Result type for encryption-layer operations.
pub type Result<T> = std::result::Result<T, Error>;
