//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic and key-management errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong key, tampered data, or algorithm mismatch).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Key material has the wrong size or shape.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Ciphertext payload could not be parsed.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// The key-management service rejected the request.
    #[error("KMS error: {0}")]
    Kms(String),

    /// The key-management response could not be interpreted.
    #[error("malformed KMS response: {0}")]
    MalformedResponse(String),

    /// Transport failure reaching the key-management service.
    #[error("KMS transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
