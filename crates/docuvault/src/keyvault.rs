//! Key vault access and data-key provisioning.
//!
//! Data-encryption-key records live in a designated vault collection. They
//! are created exactly once per `(namespace, key name)` by
//! [`create_data_key`], read-only thereafter, and never mutated in place by
//! this layer.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use docuvault_crypto::{KmsClient, MasterKeySpec, PrimedKms};
use docuvault_store::{Document, Filter, IndexSpec, Namespace, StoreClient, Value};
use tracing::{debug, info};
use uuid::Uuid;

/// Vault field holding a key's alternate names.
const FIELD_ALT_NAMES: &str = "keyAltNames";
/// Vault field holding the wrapped data key.
const FIELD_KEY_MATERIAL: &str = "keyMaterial";
/// Vault field describing the wrapping master key.
const FIELD_MASTER_KEY: &str = "masterKey";
/// Vault field recording creation time.
const FIELD_CREATED: &str = "creationDate";

/// A data-encryption-key record as stored in the key vault.
#[derive(Debug, Clone)]
pub struct DataKeyRecord {
    /// Unique key identifier; doubles as the binary key id field values
    /// reference.
    pub id: Uuid,
    /// Alternate names the key is looked up by.
    pub key_alt_names: Vec<String>,
    /// Ciphertext of the data key, wrapped by the master key.
    pub key_material: Vec<u8>,
    /// Which master key wrapped `key_material`.
    pub master_key: MasterKeySpec,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl DataKeyRecord {
    /// Encodes the record into its vault document shape.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut master = Document::new();
        master.insert("key", self.master_key.key_arn.as_str());
        master.insert("region", self.master_key.region.as_str());
        if let Some(endpoint) = &self.master_key.endpoint {
            master.insert("endpoint", endpoint.as_str());
        }

        let mut doc = Document::new();
        doc.insert("_id", self.id);
        doc.insert(
            FIELD_ALT_NAMES,
            self.key_alt_names
                .iter()
                .map(|n| Value::from(n.as_str()))
                .collect::<Vec<_>>(),
        );
        doc.insert(FIELD_KEY_MATERIAL, self.key_material.clone());
        doc.insert(FIELD_MASTER_KEY, master);
        doc.insert(FIELD_CREATED, self.created_at);
        doc
    }

    /// Decodes a vault document back into a record.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let id = match doc.get("_id") {
            Some(Value::Uuid(id)) => *id,
            other => return Err(codec("_id", other)),
        };
        let key_alt_names = match doc.get(FIELD_ALT_NAMES) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(codec(FIELD_ALT_NAMES, Some(other))),
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(codec(FIELD_ALT_NAMES, other)),
        };
        let key_material = match doc.get(FIELD_KEY_MATERIAL) {
            Some(Value::Binary(bytes)) => bytes.clone(),
            other => return Err(codec(FIELD_KEY_MATERIAL, other)),
        };
        let master_key = match doc.get(FIELD_MASTER_KEY) {
            Some(Value::Document(master)) => {
                let key_arn = match master.get("key") {
                    Some(Value::String(s)) => s.clone(),
                    other => return Err(codec("masterKey.key", other)),
                };
                let region = match master.get("region") {
                    Some(Value::String(s)) => s.clone(),
                    other => return Err(codec("masterKey.region", other)),
                };
                let endpoint = match master.get("endpoint") {
                    Some(Value::String(s)) => Some(s.clone()),
                    None => None,
                    other => return Err(codec("masterKey.endpoint", other)),
                };
                MasterKeySpec {
                    key_arn,
                    region,
                    endpoint,
                }
            }
            other => return Err(codec(FIELD_MASTER_KEY, other)),
        };
        let created_at = match doc.get(FIELD_CREATED) {
            Some(Value::Timestamp(t)) => *t,
            other => return Err(codec(FIELD_CREATED, other)),
        };
        Ok(Self {
            id,
            key_alt_names,
            key_material,
            master_key,
            created_at,
        })
    }
}

fn codec(field: &str, value: Option<&Value>) -> Error {
    Error::Codec(format!("unexpected value for {field}: {value:?}"))
}

/// Looks up the data-key record named `key_name` in the vault collection.
///
/// Absence is [`Error::NoDataKeyFound`]: a configuration-state precondition,
/// not a transient fault, so callers must not retry the same read. No side
/// effects.
pub fn get_data_key(
    store: &dyn StoreClient,
    namespace: &Namespace,
    key_name: &str,
) -> Result<DataKeyRecord> {
    let vault = store.collection(namespace);
    debug!(namespace = %namespace, key_name, "looking up data key");
    let doc = vault
        .find_one(&Filter::eq(FIELD_ALT_NAMES, key_name))?
        .ok_or_else(|| Error::NoDataKeyFound {
            key_name: key_name.to_string(),
        })?;
    DataKeyRecord::from_document(&doc)
}

/// Looks up a data-key record by its unique id.
pub fn get_data_key_by_id(
    store: &dyn StoreClient,
    namespace: &Namespace,
    key_id: Uuid,
) -> Result<DataKeyRecord> {
    let vault = store.collection(namespace);
    let doc = vault
        .find_one(&Filter::eq("_id", key_id))?
        .ok_or_else(|| Error::NoDataKeyFound {
            key_name: key_id.to_string(),
        })?;
    DataKeyRecord::from_document(&doc)
}

/// One-time administrative operation: ensures the vault's unique alt-name
/// index, mints a new data-encryption key wrapped by the named master key,
/// and stores the record. Returns the new key id.
///
/// Not idempotent: a second call with the same `key_name` fails with the
/// store's uniqueness violation.
pub fn create_data_key(
    store: &dyn StoreClient,
    kms: &dyn KmsClient,
    namespace: &Namespace,
    key_arn: &str,
    key_name: &str,
    kms_endpoint: Option<&str>,
    kms_region: &str,
) -> Result<Uuid> {
    let vault = store.collection(namespace);
    vault.create_index(IndexSpec::unique(FIELD_ALT_NAMES).partial_filter_exists())?;

    let mut master_key = MasterKeySpec::new(key_arn, kms_region);
    if let Some(endpoint) = kms_endpoint {
        master_key = master_key.with_endpoint(endpoint);
    }

    // The plaintext half of the generated key is dropped (and zeroized)
    // here; only the wrapped blob is persisted.
    let generated = kms.generate_data_key(&master_key)?;
    let record = DataKeyRecord {
        id: Uuid::new_v4(),
        key_alt_names: vec![key_name.to_string()],
        key_material: generated.ciphertext_blob,
        master_key,
        created_at: Utc::now(),
    };
    vault.insert_one(record.to_document())?;
    info!(namespace = %namespace, key_name, key_id = %record.id, "provisioned data key");
    Ok(record.id)
}

/// Resolves the named data key's plaintext through `kms` once and returns a
/// [`PrimedKms`] that replays the decrypt response from memory thereafter.
///
/// The one genuine decrypt still goes through the real, authorized client;
/// priming only removes subsequent per-process network round trips.
pub fn prime_kms(
    store: &dyn StoreClient,
    kms: &dyn KmsClient,
    namespace: &Namespace,
    key_name: &str,
) -> Result<PrimedKms> {
    let record = get_data_key(store, namespace, key_name)?;
    let plaintext = kms.decrypt(&record.key_material)?;
    info!(namespace = %namespace, key_name, "primed KMS client from vault record");
    Ok(PrimedKms::from_plaintext(&plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docuvault_crypto::LocalKms;
    use docuvault_store::{MemoryStore, StoreError};

    const ARN: &str = "arn:aws:kms:us-east-1:111122223333:key/test";

    fn vault_ns() -> Namespace {
        Namespace::parse("encryption.__keyVault").unwrap()
    }

    #[test]
    fn test_get_data_key_absent_is_no_data_key_found() {
        let store = MemoryStore::new();
        let err = get_data_key(&store, &vault_ns(), "missing").unwrap_err();
        assert!(matches!(
            err,
            Error::NoDataKeyFound { ref key_name } if key_name == "missing"
        ));
    }

    #[test]
    fn test_provision_then_lookup() {
        let store = MemoryStore::new();
        let kms = LocalKms::new();
        let ns = vault_ns();

        let id = create_data_key(&store, &kms, &ns, ARN, "primary", None, "us-east-1").unwrap();

        let record = get_data_key(&store, &ns, "primary").unwrap();
        assert_eq!(record.id, id);
        assert!(record.key_alt_names.contains(&"primary".to_string()));
        assert_eq!(record.master_key.key_arn, ARN);

        let by_id = get_data_key_by_id(&store, &ns, id).unwrap();
        assert_eq!(by_id.key_material, record.key_material);
    }

    #[test]
    fn test_reprovisioning_same_name_is_uniqueness_violation() {
        let store = MemoryStore::new();
        let kms = LocalKms::new();
        let ns = vault_ns();

        create_data_key(&store, &kms, &ns, ARN, "primary", None, "us-east-1").unwrap();
        let err = create_data_key(&store, &kms, &ns, ARN, "primary", None, "us-east-1")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::DuplicateKey { ref index }) if index == FIELD_ALT_NAMES
        ));

        // The vault retains exactly one record for that name.
        let vault = store.collection(&ns);
        assert_eq!(
            vault.find(&Filter::eq(FIELD_ALT_NAMES, "primary")).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_lookup_succeeds_after_provisioning() {
        let store = MemoryStore::new();
        let kms = LocalKms::new();
        let ns = vault_ns();

        assert!(get_data_key(&store, &ns, "late").is_err());
        create_data_key(&store, &kms, &ns, ARN, "late", None, "us-east-1").unwrap();
        assert!(get_data_key(&store, &ns, "late").is_ok());
    }

    #[test]
    fn test_record_document_round_trip() {
        let record = DataKeyRecord {
            id: Uuid::new_v4(),
            key_alt_names: vec!["primary".to_string()],
            key_material: vec![1, 2, 3],
            master_key: MasterKeySpec::new(ARN, "us-east-1").with_endpoint("kms.local:8080"),
            created_at: Utc::now(),
        };
        let back = DataKeyRecord::from_document(&record.to_document()).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.key_alt_names, record.key_alt_names);
        assert_eq!(back.key_material, record.key_material);
        assert_eq!(back.master_key, record.master_key);
    }

    #[test]
    fn test_prime_kms_replays_plaintext() {
        let store = MemoryStore::new();
        let kms = LocalKms::new();
        let ns = vault_ns();

        create_data_key(&store, &kms, &ns, ARN, "primary", None, "us-east-1").unwrap();
        let record = get_data_key(&store, &ns, "primary").unwrap();

        use docuvault_crypto::KmsClient as _;
        let primed = prime_kms(&store, &kms, &ns, "primary").unwrap();
        let via_network = kms.decrypt(&record.key_material).unwrap();
        let via_primed = primed.decrypt(&record.key_material).unwrap();
        assert_eq!(via_primed, via_network);
    }
}
