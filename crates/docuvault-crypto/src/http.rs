//! Network-backed key-management client.
//!
//! Speaks the KMS JSON protocol (`application/x-amz-json-1.1`, `X-Amz-Target`
//! operation routing) over a blocking HTTP client with SigV4-signed requests.
//! Timeouts and transport failures surface as [`CryptoError::Transport`];
//! service rejections surface as [`CryptoError::Kms`]. Nothing is retried
//! here.

use crate::sigv4::{authorization_header, SigningRequest};
use crate::{CryptoError, CryptoResult, GeneratedDataKey, KeyMaterial, KmsClient, MasterKeySpec};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::fmt;
use tracing::debug;

const SERVICE: &str = "kms";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Network-backed KMS client bound to one set of credentials and a default
/// region/endpoint. Holds a pooled HTTP client, so reuse beats
/// reconstruction.
pub struct HttpKms {
    http: reqwest::blocking::Client,
    region: String,
    endpoint: Option<String>,
    access_key_id: String,
    secret_access_key: SecretString,
}

impl HttpKms {
    /// Creates a client for `region` with the given credentials.
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: SecretString,
    ) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            region: region.into(),
            endpoint: None,
            access_key_id: access_key_id.into(),
            secret_access_key,
        }
    }

    /// Overrides the endpoint host (VPC endpoints, local stacks).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn host_for(&self, region: &str, endpoint: Option<&str>) -> String {
        endpoint
            .or(self.endpoint.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("kms.{region}.amazonaws.com"))
    }

    /// Signs and posts one KMS operation, returning the decoded JSON body.
    fn post(
        &self,
        region: &str,
        host: &str,
        target: &str,
        body: &serde_json::Value,
    ) -> CryptoResult<serde_json::Value> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| CryptoError::MalformedResponse(e.to_string()))?;
        let amz_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        let authorization = authorization_header(&SigningRequest {
            method: "POST",
            canonical_uri: "/",
            canonical_query: "",
            headers: &[
                ("content-type", CONTENT_TYPE),
                ("host", host),
                ("x-amz-date", &amz_date),
                ("x-amz-target", target),
            ],
            payload: &payload,
            region,
            service: SERVICE,
            amz_date: &amz_date,
            access_key_id: &self.access_key_id,
            secret_access_key: self.secret_access_key.expose_secret(),
        });

        debug!(target, host, "posting KMS request");
        let response = self
            .http
            .post(format!("https://{host}/"))
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Date", &amz_date)
            .header("X-Amz-Target", target)
            .header("Authorization", authorization)
            .body(payload)
            .send()?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .map_err(|e| CryptoError::MalformedResponse(e.to_string()))?;
        if !status.is_success() {
            let kind = body
                .get("__type")
                .and_then(|v| v.as_str())
                .unwrap_or("UnknownError");
            let message = body
                .get("message")
                .or_else(|| body.get("Message"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            return Err(CryptoError::Kms(format!("{kind}: {message}")));
        }
        Ok(body)
    }

    fn base64_field(body: &serde_json::Value, field: &str) -> CryptoResult<Vec<u8>> {
        let encoded = body
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| CryptoError::MalformedResponse(format!("missing {field}")))?;
        BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::MalformedResponse(format!("bad {field}: {e}")))
    }
}

impl KmsClient for HttpKms {
    fn decrypt(&self, ciphertext_blob: &[u8]) -> CryptoResult<KeyMaterial> {
        let host = self.host_for(&self.region, None);
        let body = self.post(
            &self.region,
            &host,
            "TrentService.Decrypt",
            &json!({ "CiphertextBlob": BASE64.encode(ciphertext_blob) }),
        )?;
        Ok(KeyMaterial::new(Self::base64_field(&body, "Plaintext")?))
    }

    fn generate_data_key(&self, master_key: &MasterKeySpec) -> CryptoResult<GeneratedDataKey> {
        let host = self.host_for(&master_key.region, master_key.endpoint.as_deref());
        let body = self.post(
            &master_key.region,
            &host,
            "TrentService.GenerateDataKey",
            &json!({ "KeyId": master_key.key_arn, "KeySpec": "AES_256" }),
        )?;
        Ok(GeneratedDataKey {
            plaintext: KeyMaterial::new(Self::base64_field(&body, "Plaintext")?),
            ciphertext_blob: Self::base64_field(&body, "CiphertextBlob")?,
        })
    }
}

impl fmt::Debug for HttpKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpKms")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}
