//! Encryption configuration.
//!
//! Configuration is an explicit struct handed to
//! [`crate::field::FieldEncryption`] at construction, not process-wide
//! mutable state. It is expected to be built once at startup, before
//! concurrent traffic begins.

use crate::{Error, Result};
use docuvault_crypto::HttpKms;
use docuvault_store::Namespace;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::fmt;

/// Environment variable names recognized by [`EncryptionConfig::from_env`].
const ENV_REGION: &str = "KMS_REGION";
const ENV_ACCESS_KEY: &str = "KMS_AWS_ACCESS_KEY";
const ENV_SECRET_KEY: &str = "KMS_AWS_SECRET_ACCESS_KEY";
const ENV_ENDPOINT: &str = "KMS_ENDPOINT";

/// Key-management service credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key, redacted in `Debug`.
    pub secret_access_key: SecretString,
}

impl AwsCredentials {
    /// Creates a credential pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Configuration shared by every encrypted field of a schema: credentials,
/// region, optional endpoint override, and the key vault coordinates
/// (namespace plus the alt-name of the data key).
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Key-management credentials.
    pub credentials: AwsCredentials,
    /// Key-management region.
    pub region: String,
    /// Endpoint host override; `None` uses the regional default.
    pub endpoint: Option<String>,
    /// Namespace of the key vault collection.
    pub key_namespace: Namespace,
    /// Alt-name of the data-encryption key.
    pub key_name: String,
}

impl EncryptionConfig {
    /// Builds a configuration, parsing the dotted namespace string.
    /// A malformed namespace is a configuration error.
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        key_namespace: &str,
        key_name: impl Into<String>,
    ) -> Result<Self> {
        let key_namespace = Namespace::parse(key_namespace)
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            credentials,
            region: region.into(),
            endpoint: None,
            key_namespace,
            key_name: key_name.into(),
        })
    }

    /// Sets an endpoint host override.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Reads `KMS_REGION`, `KMS_AWS_ACCESS_KEY`, `KMS_AWS_SECRET_ACCESS_KEY`
    /// and `KMS_ENDPOINT` from the environment. A missing variable is a
    /// startup-time fatal configuration error.
    pub fn from_env(key_namespace: &str, key_name: impl Into<String>) -> Result<Self> {
        let config = Self::new(
            AwsCredentials::new(require_env(ENV_ACCESS_KEY)?, require_env(ENV_SECRET_KEY)?),
            require_env(ENV_REGION)?,
            key_namespace,
            key_name,
        )?;
        Ok(config.with_endpoint(require_env(ENV_ENDPOINT)?))
    }

    /// Builds a network-backed key-management client from this
    /// configuration.
    #[must_use]
    pub fn http_kms(&self) -> HttpKms {
        let kms = HttpKms::new(
            &self.region,
            &self.credentials.access_key_id,
            SecretString::new(self.credentials.secret_access_key.expose_secret().to_string()),
        );
        match &self.endpoint {
            Some(endpoint) => kms.with_endpoint(endpoint),
            None => kms,
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("missing environment variable {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> AwsCredentials {
        AwsCredentials::new("AKIDEXAMPLE", "hunter2")
    }

    #[test]
    fn test_new_parses_namespace() {
        let config =
            EncryptionConfig::new(credentials(), "us-east-1", "encryption.__keyVault", "primary")
                .unwrap();
        assert_eq!(config.key_namespace.database(), "encryption");
        assert_eq!(config.key_namespace.collection(), "__keyVault");
        assert_eq!(config.key_name, "primary");
    }

    #[test]
    fn test_malformed_namespace_is_config_error() {
        let err =
            EncryptionConfig::new(credentials(), "us-east-1", "nodot", "primary").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("hunter2"));
    }
}
