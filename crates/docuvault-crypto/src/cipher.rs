//! Field-value ciphers.
//!
//! Field values are encrypted with AES-256-GCM under a data-encryption key.
//! Two modes are offered:
//!
//! - [`EncryptionAlgorithm::Deterministic`] derives the nonce from the key
//!   and the plaintext (HMAC-SHA-256, truncated), so equal plaintexts under
//!   one key produce byte-identical ciphertexts. Equality filters against
//!   encrypted fields depend on this.
//! - [`EncryptionAlgorithm::Randomized`] draws a fresh random nonce per
//!   call. Stronger confidentiality, unusable for equality queries.

use crate::{CryptoError, CryptoResult, KeyMaterial};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

/// Data-encryption keys are 256-bit AES keys.
pub const DATA_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const KEY_ID_LEN: usize = 16;
const MARKER_DETERMINISTIC: u8 = 1;
const MARKER_RANDOMIZED: u8 = 2;

/// Field encryption mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionAlgorithm {
    /// Synthetic nonce; identical plaintext+key yields identical ciphertext.
    Deterministic,
    /// Random nonce; two encryptions of the same value differ.
    Randomized,
}

impl EncryptionAlgorithm {
    fn marker(self) -> u8 {
        match self {
            Self::Deterministic => MARKER_DETERMINISTIC,
            Self::Randomized => MARKER_RANDOMIZED,
        }
    }

    fn from_marker(marker: u8) -> CryptoResult<Self> {
        match marker {
            MARKER_DETERMINISTIC => Ok(Self::Deterministic),
            MARKER_RANDOMIZED => Ok(Self::Randomized),
            other => Err(CryptoError::InvalidCiphertext(format!(
                "unknown algorithm marker {other}"
            ))),
        }
    }
}

/// An encrypted field value: algorithm marker, the id of the data key that
/// encrypted it, the nonce, and the ciphertext with its authentication tag.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCiphertext {
    /// Mode the value was encrypted under.
    pub algorithm: EncryptionAlgorithm,
    /// Identifier of the data-encryption key.
    pub key_id: Uuid,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl FieldCiphertext {
    /// Serializes to the stored wire layout:
    /// `[algorithm:1][key id:16][nonce:12][ciphertext+tag]`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + KEY_ID_LEN + NONCE_LEN + self.ciphertext.len());
        out.push(self.algorithm.marker());
        out.extend_from_slice(self.key_id.as_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses the stored wire layout.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < 1 + KEY_ID_LEN + NONCE_LEN {
            return Err(CryptoError::InvalidCiphertext(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }
        let algorithm = EncryptionAlgorithm::from_marker(bytes[0])?;
        let key_id = Uuid::from_slice(&bytes[1..1 + KEY_ID_LEN])
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1 + KEY_ID_LEN..1 + KEY_ID_LEN + NONCE_LEN]);
        Ok(Self {
            algorithm,
            key_id,
            nonce,
            ciphertext: bytes[1 + KEY_ID_LEN + NONCE_LEN..].to_vec(),
        })
    }
}

/// Stateless AES-256-GCM field cipher.
pub struct FieldCipher;

impl FieldCipher {
    /// Encrypts a field value under `key` (identified by `key_id`).
    pub fn encrypt(
        key: &KeyMaterial,
        key_id: Uuid,
        algorithm: EncryptionAlgorithm,
        plaintext: &[u8],
    ) -> CryptoResult<FieldCiphertext> {
        Self::validate_key(key)?;
        let nonce = match algorithm {
            EncryptionAlgorithm::Deterministic => Self::synthetic_nonce(key, plaintext),
            EncryptionAlgorithm::Randomized => {
                let mut nonce = [0u8; NONCE_LEN];
                rand::thread_rng().fill_bytes(&mut nonce);
                nonce
            }
        };

        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed("AEAD encryption failed".to_string()))?;

        Ok(FieldCiphertext {
            algorithm,
            key_id,
            nonce,
            ciphertext,
        })
    }

    /// Decrypts a field value under `key`.
    pub fn decrypt(key: &KeyMaterial, payload: &FieldCiphertext) -> CryptoResult<Vec<u8>> {
        Self::validate_key(key)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        cipher
            .decrypt(
                Nonce::from_slice(&payload.nonce),
                payload.ciphertext.as_slice(),
            )
            .map_err(|_| CryptoError::DecryptionFailed("AEAD decryption failed".to_string()))
    }

    /// Synthetic IV for deterministic mode: HMAC-SHA-256 over the plaintext,
    /// keyed by the data key, truncated to the nonce size. Nonce reuse only
    /// occurs for identical (key, plaintext) pairs, which produce identical
    /// ciphertexts anyway.
    fn synthetic_nonce(key: &KeyMaterial, plaintext: &[u8]) -> [u8; NONCE_LEN] {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key.as_slice())
            .expect("HMAC accepts any key length");
        mac.update(plaintext);
        let digest = mac.finalize().into_bytes();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }

    fn validate_key(key: &KeyMaterial) -> CryptoResult<()> {
        if key.len() != DATA_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {DATA_KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        Ok(())
    }

    /// Generates a fresh random data-encryption key.
    #[must_use]
    pub fn generate_key() -> KeyMaterial {
        let mut key = vec![0u8; DATA_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        KeyMaterial::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyMaterial {
        FieldCipher::generate_key()
    }

    #[test]
    fn test_round_trip_deterministic() {
        let key = key();
        let id = Uuid::new_v4();
        let enc =
            FieldCipher::encrypt(&key, id, EncryptionAlgorithm::Deterministic, b"secret").unwrap();
        assert_eq!(FieldCipher::decrypt(&key, &enc).unwrap(), b"secret");
    }

    #[test]
    fn test_deterministic_is_stable_randomized_is_not() {
        let key = key();
        let id = Uuid::new_v4();

        let a = FieldCipher::encrypt(&key, id, EncryptionAlgorithm::Deterministic, b"v").unwrap();
        let b = FieldCipher::encrypt(&key, id, EncryptionAlgorithm::Deterministic, b"v").unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());

        let c = FieldCipher::encrypt(&key, id, EncryptionAlgorithm::Randomized, b"v").unwrap();
        let d = FieldCipher::encrypt(&key, id, EncryptionAlgorithm::Randomized, b"v").unwrap();
        assert_ne!(c.to_bytes(), d.to_bytes());
        assert_eq!(FieldCipher::decrypt(&key, &c).unwrap(), b"v");
        assert_eq!(FieldCipher::decrypt(&key, &d).unwrap(), b"v");
    }

    #[test]
    fn test_payload_round_trips_through_bytes() {
        let key = key();
        let id = Uuid::new_v4();
        let enc =
            FieldCipher::encrypt(&key, id, EncryptionAlgorithm::Randomized, b"payload").unwrap();

        let parsed = FieldCiphertext::from_bytes(&enc.to_bytes()).unwrap();
        assert_eq!(parsed, enc);
        assert_eq!(parsed.key_id, id);
        assert_eq!(parsed.algorithm, EncryptionAlgorithm::Randomized);
    }

    #[test]
    fn test_wrong_key_fails() {
        let enc = FieldCipher::encrypt(
            &key(),
            Uuid::new_v4(),
            EncryptionAlgorithm::Deterministic,
            b"secret",
        )
        .unwrap();
        assert!(matches!(
            FieldCipher::decrypt(&key(), &enc),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        assert!(matches!(
            FieldCiphertext::from_bytes(&[1, 2, 3]),
            Err(CryptoError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn test_unknown_marker_rejected() {
        let mut bytes = FieldCipher::encrypt(
            &key(),
            Uuid::new_v4(),
            EncryptionAlgorithm::Deterministic,
            b"x",
        )
        .unwrap()
        .to_bytes();
        bytes[0] = 9;
        assert!(FieldCiphertext::from_bytes(&bytes).is_err());
    }
}
