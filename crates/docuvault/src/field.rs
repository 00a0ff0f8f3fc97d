//! The encrypted string field type.
//!
//! [`EncryptedString`] is a field descriptor attached to a document schema:
//! on write it encrypts the plaintext into opaque binary, on read it
//! decrypts (or passes plaintext and absence through), and it participates
//! in query-value preparation so equality filters are matched against
//! ciphertext.

use crate::cache::DataKeyCache;
use crate::client::ClientEncryptionPool;
use crate::config::EncryptionConfig;
use crate::{Error, Result};
use docuvault_crypto::{EncryptionAlgorithm, KmsClient};
use docuvault_store::{StoreClient, Value};
use std::sync::Arc;
use uuid::Uuid;

/// What an encrypted field's slot in a stored document holds.
///
/// Decoded explicitly at the storage boundary instead of inferred from
/// runtime types: binary is ciphertext, a bare string is legacy or unsaved
/// plaintext, absence stays absence.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Field missing or null.
    Absent,
    /// Not-yet-encrypted plaintext (legacy data or in-memory values).
    Plaintext(String),
    /// Encrypted payload.
    Ciphertext(Vec<u8>),
}

impl StoredValue {
    /// Decodes a document slot.
    pub fn decode(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::Absent),
            Some(Value::String(s)) => Ok(Self::Plaintext(s.clone())),
            Some(Value::Binary(b)) => Ok(Self::Ciphertext(b.clone())),
            Some(other) => Err(Error::Codec(format!(
                "encrypted field holds unexpected value: {other:?}"
            ))),
        }
    }

    /// Encodes back into a document slot.
    #[must_use]
    pub fn encode(self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Plaintext(s) => Value::String(s),
            Self::Ciphertext(b) => Value::Binary(b),
        }
    }
}

/// Shared encryption state for every encrypted field of a schema: the
/// configuration, the key id cache, and the session pool. Built once at
/// startup; all field instances of a schema hold the same `Arc`.
pub struct FieldEncryption {
    config: EncryptionConfig,
    store: Arc<dyn StoreClient>,
    cache: DataKeyCache,
    pool: ClientEncryptionPool,
}

impl FieldEncryption {
    /// Configures field encryption with an explicit key-management client.
    pub fn configure(
        config: EncryptionConfig,
        store: Arc<dyn StoreClient>,
        kms: Arc<dyn KmsClient>,
    ) -> Arc<Self> {
        let pool = ClientEncryptionPool::new(kms, store.clone(), config.key_namespace.clone());
        Arc::new(Self {
            config,
            store,
            cache: DataKeyCache::new(),
            pool,
        })
    }

    /// Configures field encryption against the real key-management service,
    /// building the network-backed client from the configuration.
    pub fn configure_aws_kms(config: EncryptionConfig, store: Arc<dyn StoreClient>) -> Arc<Self> {
        let kms = Arc::new(config.http_kms());
        Self::configure(config, store, kms)
    }

    /// Returns the configuration this state was built from.
    #[must_use]
    pub fn config(&self) -> &EncryptionConfig {
        &self.config
    }

    /// Resolves the configured data key's id, cached after the first vault
    /// lookup.
    pub fn data_key_id(&self) -> Result<Uuid> {
        self.cache.get_data_key_id(
            self.store.as_ref(),
            &self.config.key_namespace,
            &self.config.key_name,
        )
    }

    /// Drops the cached key id (after an out-of-band key rotation).
    pub fn clear_key_cache(&self) {
        self.cache.clear();
    }

    fn encrypt(&self, plaintext: &str, algorithm: EncryptionAlgorithm) -> Result<Vec<u8>> {
        let key_id = self.data_key_id()?;
        let session = self.pool.acquire();
        session.encrypt(plaintext.as_bytes(), algorithm, key_id)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<String> {
        let session = self.pool.acquire();
        let plaintext = session.decrypt(payload)?;
        String::from_utf8(plaintext).map_err(|e| Error::Codec(e.to_string()))
    }
}

/// An encrypted string field.
///
/// Equality filters built through [`EncryptedString::prepare_query_value`]
/// only match reliably under [`EncryptionAlgorithm::Deterministic`]; with a
/// randomized algorithm the probe ciphertext never equals the stored one.
/// That is a property of the cryptosystem, and this layer does not mask it.
#[derive(Clone)]
pub struct EncryptedString {
    algorithm: EncryptionAlgorithm,
    encryption: Arc<FieldEncryption>,
}

impl EncryptedString {
    /// Creates a field bound to its schema's shared encryption state.
    pub fn new(algorithm: EncryptionAlgorithm, encryption: Arc<FieldEncryption>) -> Self {
        Self {
            algorithm,
            encryption,
        }
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// Write path: `None` is stored as null (absence is not encrypted);
    /// anything else becomes opaque ciphertext bytes.
    pub fn to_store(&self, value: Option<&str>) -> Result<Value> {
        match value {
            None => Ok(Value::Null),
            Some(plaintext) => Ok(Value::Binary(
                self.encryption.encrypt(plaintext, self.algorithm)?,
            )),
        }
    }

    /// Read path: absence and bare plaintext pass through unchanged;
    /// binary payloads are decrypted.
    pub fn from_store(&self, value: Option<&Value>) -> Result<Option<String>> {
        match StoredValue::decode(value)? {
            StoredValue::Absent => Ok(None),
            StoredValue::Plaintext(s) => Ok(Some(s)),
            StoredValue::Ciphertext(payload) => Ok(Some(self.encryption.decrypt(&payload)?)),
        }
    }

    /// Prepares an equality-filter probe: the value is encrypted exactly as
    /// the write path would, so the filter compares ciphertext to
    /// ciphertext. There is no operator parameter: equality is the only
    /// filter the store boundary supports, so every probe is an equality
    /// probe.
    pub fn prepare_query_value(&self, value: &str) -> Result<Value> {
        self.to_store(Some(value))
    }
}
