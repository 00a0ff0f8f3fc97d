//! # Docuvault Crypto
//!
//! Cryptographic services for the docuvault encryption layer:
//! - AES-256-GCM field ciphers, deterministic and randomized
//! - The `KmsClient` strategy trait with network-backed, primed-response,
//!   and in-process variants
//! - Zeroized key material types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod http;
pub mod key;
pub mod kms;
pub mod primed;
mod sigv4;

pub use cipher::{EncryptionAlgorithm, FieldCipher, FieldCiphertext, DATA_KEY_LEN};
pub use error::{CryptoError, CryptoResult};
pub use http::HttpKms;
pub use key::{KeyMaterial, MasterKeySpec};
pub use kms::{GeneratedDataKey, KmsClient, LocalKms};
pub use primed::PrimedKms;
