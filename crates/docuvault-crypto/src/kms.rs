//! Key-management client strategy.
//!
//! The adapter is an explicit strategy trait with three variants selected at
//! construction time: [`crate::HttpKms`] (network-backed), [`crate::PrimedKms`]
//! (pre-computed response), and [`LocalKms`] (in-process master key for tests
//! and development).

use crate::cipher::DATA_KEY_LEN;
use crate::{CryptoError, CryptoResult, KeyMaterial, MasterKeySpec};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

/// A freshly minted data-encryption key: the plaintext key and the same key
/// wrapped by the master key for at-rest storage.
pub struct GeneratedDataKey {
    /// Plaintext data key.
    pub plaintext: KeyMaterial,
    /// Data key encrypted by the master key.
    pub ciphertext_blob: Vec<u8>,
}

/// Key-management service client.
pub trait KmsClient: Send + Sync {
    /// Unwraps a data-encryption key previously wrapped by the master key.
    fn decrypt(&self, ciphertext_blob: &[u8]) -> CryptoResult<KeyMaterial>;

    /// Mints a new data-encryption key wrapped by `master_key`.
    fn generate_data_key(&self, master_key: &MasterKeySpec) -> CryptoResult<GeneratedDataKey>;
}

/// In-process key-management client holding a single master key.
///
/// Wrapped blobs are `nonce || ciphertext` under AES-256-GCM with the master
/// key. Intended for tests and development; it mirrors the service contract
/// without any network dependency.
pub struct LocalKms {
    master_key: KeyMaterial,
}

impl LocalKms {
    /// Creates a local client with a random master key.
    #[must_use]
    pub fn new() -> Self {
        let mut key = vec![0u8; DATA_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self {
            master_key: KeyMaterial::new(key),
        }
    }

    /// Creates a local client with a caller-provided master key.
    pub fn with_master_key(master_key: KeyMaterial) -> CryptoResult<Self> {
        if master_key.len() != DATA_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "master key must be {DATA_KEY_LEN} bytes"
            )));
        }
        Ok(Self { master_key })
    }

    fn cipher(&self) -> CryptoResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.master_key.as_slice())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl Default for LocalKms {
    fn default() -> Self {
        Self::new()
    }
}

impl KmsClient for LocalKms {
    fn decrypt(&self, ciphertext_blob: &[u8]) -> CryptoResult<KeyMaterial> {
        if ciphertext_blob.len() < 12 {
            return Err(CryptoError::InvalidCiphertext(
                "wrapped key blob too short".to_string(),
            ));
        }
        let (nonce, ciphertext) = ciphertext_blob.split_at(12);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Kms("master key failed to unwrap data key".to_string()))?;
        Ok(KeyMaterial::new(plaintext))
    }

    fn generate_data_key(&self, _master_key: &MasterKeySpec) -> CryptoResult<GeneratedDataKey> {
        let mut key = vec![0u8; DATA_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        let plaintext = KeyMaterial::new(key);

        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        let wrapped = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| CryptoError::Kms("master key failed to wrap data key".to_string()))?;

        let mut ciphertext_blob = nonce.to_vec();
        ciphertext_blob.extend_from_slice(&wrapped);
        Ok(GeneratedDataKey {
            plaintext,
            ciphertext_blob,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_decrypt_round_trips() {
        let kms = LocalKms::new();
        let master = MasterKeySpec::new("arn:aws:kms:us-east-1:0:key/test", "us-east-1");

        let generated = kms.generate_data_key(&master).unwrap();
        assert_eq!(generated.plaintext.len(), DATA_KEY_LEN);

        let unwrapped = kms.decrypt(&generated.ciphertext_blob).unwrap();
        assert_eq!(unwrapped, generated.plaintext);
    }

    #[test]
    fn test_decrypt_with_other_master_key_fails() {
        let kms = LocalKms::new();
        let other = LocalKms::new();
        let master = MasterKeySpec::new("arn:aws:kms:us-east-1:0:key/test", "us-east-1");

        let generated = kms.generate_data_key(&master).unwrap();
        assert!(matches!(
            other.decrypt(&generated.ciphertext_blob),
            Err(CryptoError::Kms(_))
        ));
    }

    #[test]
    fn test_short_blob_rejected() {
        let kms = LocalKms::new();
        assert!(matches!(
            kms.decrypt(&[0u8; 4]),
            Err(CryptoError::InvalidCiphertext(_))
        ));
    }
}
