//! Key material cache.

use crate::{keyvault, Result};
use docuvault_store::{Namespace, StoreClient};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Memoizes the data-key id per `(namespace, key name)` pair so repeated
/// field operations avoid redundant vault lookups.
///
/// Only successful lookups are cached; a failed lookup is retried on the
/// next call, so a later provisioning is picked up. Entries are immutable
/// once cached and never evicted: if the underlying vault record is rotated
/// the cache goes stale until [`DataKeyCache::clear`] or a process restart.
/// There is no automatic invalidation.
///
/// Two concurrent callers missing on the same pair may both perform the
/// vault lookup; that is a safe idempotent read and is left unoptimized.
#[derive(Default)]
pub struct DataKeyCache {
    entries: RwLock<HashMap<(String, String), Uuid>>,
}

impl DataKeyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the data-key id for `(namespace, key_name)`, looking it up in
    /// the vault on first use.
    pub fn get_data_key_id(
        &self,
        store: &dyn StoreClient,
        namespace: &Namespace,
        key_name: &str,
    ) -> Result<Uuid> {
        let cache_key = (namespace.to_string(), key_name.to_string());
        if let Some(id) = self.entries.read().get(&cache_key) {
            debug!(namespace = %namespace, key_name, "data key cache hit");
            return Ok(*id);
        }

        let record = keyvault::get_data_key(store, namespace, key_name)?;
        debug!(namespace = %namespace, key_name, key_id = %record.id, "data key cached");
        self.entries.write().insert(cache_key, record.id);
        Ok(record.id)
    }

    /// Drops every cached entry. The only in-process escape hatch after a
    /// key rotation.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvault::create_data_key;
    use crate::Error;
    use docuvault_crypto::LocalKms;
    use docuvault_store::{Collection, Document, Filter, MemoryStore, StoreResult};
    use parking_lot::Mutex;
    use std::sync::Arc;

    const ARN: &str = "arn:aws:kms:us-east-1:111122223333:key/test";

    /// Store wrapper counting `find_one` calls on its collections.
    struct CountingStore {
        inner: MemoryStore,
        lookups: Arc<Mutex<usize>>,
    }

    struct CountingCollection {
        inner: Arc<dyn Collection>,
        lookups: Arc<Mutex<usize>>,
    }

    impl StoreClient for CountingStore {
        fn collection(&self, namespace: &Namespace) -> Arc<dyn Collection> {
            Arc::new(CountingCollection {
                inner: self.inner.collection(namespace),
                lookups: self.lookups.clone(),
            })
        }
    }

    impl Collection for CountingCollection {
        fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
            *self.lookups.lock() += 1;
            self.inner.find_one(filter)
        }

        fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
            self.inner.find(filter)
        }

        fn count(&self) -> StoreResult<u64> {
            self.inner.count()
        }

        fn insert_one(&self, doc: Document) -> StoreResult<()> {
            self.inner.insert_one(doc)
        }

        fn save_one(&self, doc: Document) -> StoreResult<()> {
            self.inner.save_one(doc)
        }

        fn create_index(&self, spec: docuvault_store::IndexSpec) -> StoreResult<()> {
            self.inner.create_index(spec)
        }
    }

    fn counting_store() -> (CountingStore, Arc<Mutex<usize>>) {
        let lookups = Arc::new(Mutex::new(0));
        (
            CountingStore {
                inner: MemoryStore::new(),
                lookups: lookups.clone(),
            },
            lookups,
        )
    }

    fn vault_ns() -> Namespace {
        Namespace::parse("encryption.__keyVault").unwrap()
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let (store, lookups) = counting_store();
        let kms = LocalKms::new();
        let ns = vault_ns();
        let id = create_data_key(&store, &kms, &ns, ARN, "primary", None, "us-east-1").unwrap();

        let cache = DataKeyCache::new();
        assert_eq!(cache.get_data_key_id(&store, &ns, "primary").unwrap(), id);
        assert_eq!(cache.get_data_key_id(&store, &ns, "primary").unwrap(), id);
        assert_eq!(*lookups.lock(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_lookup_is_not_memoized() {
        let (store, lookups) = counting_store();
        let kms = LocalKms::new();
        let ns = vault_ns();
        let cache = DataKeyCache::new();

        assert!(matches!(
            cache.get_data_key_id(&store, &ns, "late").unwrap_err(),
            Error::NoDataKeyFound { .. }
        ));
        assert!(cache.is_empty());

        // Provisioning after the failure is picked up on the next call.
        let id = create_data_key(&store, &kms, &ns, ARN, "late", None, "us-east-1").unwrap();
        assert_eq!(cache.get_data_key_id(&store, &ns, "late").unwrap(), id);
        assert_eq!(*lookups.lock(), 2);
    }

    #[test]
    fn test_entries_are_keyed_per_pair() {
        let (store, _) = counting_store();
        let kms = LocalKms::new();
        let ns = vault_ns();
        let a = create_data_key(&store, &kms, &ns, ARN, "a", None, "us-east-1").unwrap();
        let b = create_data_key(&store, &kms, &ns, ARN, "b", None, "us-east-1").unwrap();

        let cache = DataKeyCache::new();
        assert_eq!(cache.get_data_key_id(&store, &ns, "a").unwrap(), a);
        assert_eq!(cache.get_data_key_id(&store, &ns, "b").unwrap(), b);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
