//! Client-encryption sessions and their pool.
//!
//! A [`ClientEncryption`] binds a key-management client to a key vault
//! collection and performs the per-value encrypt/decrypt work: fetch the key
//! record, unwrap the data key through the KMS client, run the field cipher.
//! Sessions are acquired from a [`ClientEncryptionPool`] through an RAII
//! guard, so release happens on every exit path including errors.

use crate::{keyvault::DataKeyRecord, Error, Result};
use docuvault_crypto::{EncryptionAlgorithm, FieldCipher, FieldCiphertext, KmsClient};
use docuvault_store::{Collection, Filter, Namespace, StoreClient};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One encryption session bound to a KMS client and a vault collection.
pub struct ClientEncryption {
    kms: Arc<dyn KmsClient>,
    vault: Arc<dyn Collection>,
}

impl ClientEncryption {
    /// Binds a session to the vault collection at `key_namespace`.
    pub fn new(
        kms: Arc<dyn KmsClient>,
        store: &dyn StoreClient,
        key_namespace: &Namespace,
    ) -> Self {
        Self {
            kms,
            vault: store.collection(key_namespace),
        }
    }

    fn data_key(&self, key_id: Uuid) -> Result<DataKeyRecord> {
        let doc = self
            .vault
            .find_one(&Filter::eq("_id", key_id))?
            .ok_or_else(|| Error::NoDataKeyFound {
                key_name: key_id.to_string(),
            })?;
        DataKeyRecord::from_document(&doc)
    }

    /// Encrypts a plaintext value under the data key `key_id`, returning the
    /// stored ciphertext payload.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        algorithm: EncryptionAlgorithm,
        key_id: Uuid,
    ) -> Result<Vec<u8>> {
        let record = self.data_key(key_id)?;
        let dek = self.kms.decrypt(&record.key_material)?;
        let payload = FieldCipher::encrypt(&dek, key_id, algorithm, plaintext)?;
        Ok(payload.to_bytes())
    }

    /// Decrypts a stored ciphertext payload. The data key is identified by
    /// the key id embedded in the payload.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let parsed = FieldCiphertext::from_bytes(payload)?;
        let record = self.data_key(parsed.key_id)?;
        let dek = self.kms.decrypt(&record.key_material)?;
        Ok(FieldCipher::decrypt(&dek, &parsed)?)
    }
}

/// Pool of reusable [`ClientEncryption`] sessions for one
/// (KMS client, vault) pair.
pub struct ClientEncryptionPool {
    kms: Arc<dyn KmsClient>,
    store: Arc<dyn StoreClient>,
    key_namespace: Namespace,
    idle: Mutex<Vec<ClientEncryption>>,
}

impl ClientEncryptionPool {
    /// Creates an empty pool; sessions are built lazily on first acquire.
    pub fn new(
        kms: Arc<dyn KmsClient>,
        store: Arc<dyn StoreClient>,
        key_namespace: Namespace,
    ) -> Self {
        Self {
            kms,
            store,
            key_namespace,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Acquires a session, reusing an idle one when available. The guard
    /// returns the session to the pool when dropped.
    pub fn acquire(&self) -> ClientEncryptionGuard<'_> {
        let client = self.idle.lock().pop().unwrap_or_else(|| {
            debug!(namespace = %self.key_namespace, "building client-encryption session");
            ClientEncryption::new(self.kms.clone(), self.store.as_ref(), &self.key_namespace)
        });
        ClientEncryptionGuard {
            pool: self,
            client: Some(client),
        }
    }

    /// Number of idle sessions held by the pool.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Scoped handle to a pooled session.
pub struct ClientEncryptionGuard<'a> {
    pool: &'a ClientEncryptionPool,
    client: Option<ClientEncryption>,
}

impl Deref for ClientEncryptionGuard<'_> {
    type Target = ClientEncryption;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("session present until drop")
    }
}

impl Drop for ClientEncryptionGuard<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.idle.lock().push(client);
        }
    }
}
