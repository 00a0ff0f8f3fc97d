//! Primed-response key-management client.
//!
//! Replays a stored, protocol-correct KMS decrypt response instead of making
//! a network call. Built for one data key whose plaintext the caller already
//! resolved through a genuine, authorized decrypt; it is an optimization to
//! skip the per-process-start network round trip, never a substitute for
//! authorization.

use crate::{CryptoError, CryptoResult, GeneratedDataKey, KeyMaterial, KmsClient, MasterKeySpec};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Base64 line width used by the synthetic response body.
const BASE64_LINE_WIDTH: usize = 76;

/// KMS client serving decryption from a stored synthetic wire response.
///
/// The response is stored as the full HTTP payload the real service would
/// send (status line, `application/x-amz-json-1.1` content type, JSON body
/// with `SYMMETRIC_DEFAULT` algorithm and the base64 plaintext, line breaks
/// escaped as `\n`) and parsed back on every call, so the stored bytes stay
/// the single source of truth.
pub struct PrimedKms {
    response: Vec<u8>,
}

#[derive(Deserialize)]
struct DecryptBody {
    #[serde(rename = "EncryptionAlgorithm")]
    encryption_algorithm: String,
    #[serde(rename = "Plaintext")]
    plaintext: String,
}

/// Base64 with a line break every 76 characters and a trailing break,
/// matching the MIME encoding the original response template carried.
fn mime_base64(bytes: &[u8]) -> String {
    let raw = BASE64.encode(bytes);
    let mut out = String::with_capacity(raw.len() + raw.len() / BASE64_LINE_WIDTH + 1);
    for chunk in raw.as_bytes().chunks(BASE64_LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 is ASCII"));
        out.push('\n');
    }
    out
}

impl PrimedKms {
    /// Builds a primed client from an already-resolved plaintext data key.
    #[must_use]
    pub fn from_plaintext(plaintext: &KeyMaterial) -> Self {
        let encoded = mime_base64(plaintext.as_slice()).replace('\n', "\\n");
        let content = format!(
            "{{\"EncryptionAlgorithm\":\"SYMMETRIC_DEFAULT\",\"Plaintext\":\"{encoded}\"}}"
        );
        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/x-amz-json-1.1\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{content}",
            content.len()
        );
        debug!(bytes = response.len(), "primed KMS decrypt response");
        Self {
            response: response.into_bytes(),
        }
    }

    /// Returns the stored wire response.
    #[must_use]
    pub fn response_bytes(&self) -> &[u8] {
        &self.response
    }

    fn parse(&self) -> CryptoResult<KeyMaterial> {
        let text = std::str::from_utf8(&self.response)
            .map_err(|e| CryptoError::MalformedResponse(e.to_string()))?;
        let (head, body) = text
            .split_once("\r\n\r\n")
            .ok_or_else(|| CryptoError::MalformedResponse("no header/body split".to_string()))?;
        if !head.starts_with("HTTP/1.1 200") {
            return Err(CryptoError::MalformedResponse(format!(
                "unexpected status line: {}",
                head.lines().next().unwrap_or("")
            )));
        }
        let parsed: DecryptBody = serde_json::from_str(body)
            .map_err(|e| CryptoError::MalformedResponse(e.to_string()))?;
        if parsed.encryption_algorithm != "SYMMETRIC_DEFAULT" {
            return Err(CryptoError::MalformedResponse(format!(
                "unexpected algorithm {}",
                parsed.encryption_algorithm
            )));
        }
        let compact: String = parsed
            .plaintext
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(KeyMaterial::new(BASE64.decode(compact).map_err(|e| {
            CryptoError::MalformedResponse(e.to_string())
        })?))
    }
}

impl KmsClient for PrimedKms {
    /// Serves the primed plaintext. The ciphertext blob argument is ignored:
    /// the client is keyed implicitly to the single data key it was built
    /// for.
    fn decrypt(&self, _ciphertext_blob: &[u8]) -> CryptoResult<KeyMaterial> {
        self.parse()
    }

    fn generate_data_key(&self, _master_key: &MasterKeySpec) -> CryptoResult<GeneratedDataKey> {
        Err(CryptoError::Kms(
            "primed client cannot mint data keys; provision through a network-backed client"
                .to_string(),
        ))
    }
}
