//! Async bridge over the blocking document operations.
//!
//! Every operation in this layer is blocking; these wrappers run them on
//! the blocking-task pool and await the result, without changing their
//! behavior. The async save variants additionally fire the pre/post-save
//! signals around the write.

use crate::schema::{self, DocumentSchema};
use crate::signals::{DocumentSignals, SignalKwargs};
use crate::Result;
use docuvault_crypto::KmsClient;
use docuvault_store::{Document, Filter, Namespace, StoreClient, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Runs a blocking closure off the caller's executor and awaits its result.
/// A panic inside the closure resumes on the caller.
pub async fn asyncify<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(err) => match err.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(err) => panic!("blocking task was cancelled: {err}"),
        },
    }
}

/// Async save (upsert by `_id`).
pub async fn save<T: DocumentSchema>(store: Arc<dyn StoreClient>, doc: Arc<T>) -> Result<()> {
    asyncify(move || schema::save(store.as_ref(), doc.as_ref())).await
}

/// Async save that fires `pre_save` before the write and `post_save` after
/// it, both awaited in full.
pub async fn save_with_signals<T: DocumentSchema>(
    store: Arc<dyn StoreClient>,
    doc: Arc<T>,
    signals: &DocumentSignals<T>,
    kwargs: SignalKwargs,
) -> Result<()> {
    signals
        .pre_save
        .send_with(doc.clone(), kwargs.clone())
        .await;
    save(store, doc.clone()).await?;
    signals.post_save.send_with(doc, kwargs).await;
    Ok(())
}

/// Async fetch by `_id`.
pub async fn get<T: DocumentSchema>(
    store: Arc<dyn StoreClient>,
    id: impl Into<Value>,
) -> Result<Option<T>> {
    let id = id.into();
    asyncify(move || schema::get(store.as_ref(), id)).await
}

/// Async first-match fetch.
pub async fn find_one<T: DocumentSchema>(
    store: Arc<dyn StoreClient>,
    filter: Filter,
) -> Result<Option<T>> {
    asyncify(move || schema::find_one(store.as_ref(), &filter)).await
}

/// Async multi-match fetch.
pub async fn find<T: DocumentSchema>(
    store: Arc<dyn StoreClient>,
    filter: Filter,
) -> Result<Vec<T>> {
    asyncify(move || schema::find(store.as_ref(), &filter)).await
}

/// Async document count.
pub async fn count<T: DocumentSchema>(store: Arc<dyn StoreClient>) -> Result<u64> {
    asyncify(move || schema::count::<T>(store.as_ref())).await
}

/// Async raw fetch, bypassing schema decoding.
pub async fn raw<T: DocumentSchema>(
    store: Arc<dyn StoreClient>,
    id: impl Into<Value>,
) -> Result<Option<Document>> {
    let id = id.into();
    asyncify(move || schema::raw::<T>(store.as_ref(), id)).await
}

/// Async data-key provisioning.
#[allow(clippy::too_many_arguments)]
pub async fn create_data_key(
    store: Arc<dyn StoreClient>,
    kms: Arc<dyn KmsClient>,
    namespace: Namespace,
    key_arn: String,
    key_name: String,
    kms_endpoint: Option<String>,
    kms_region: String,
) -> Result<Uuid> {
    asyncify(move || {
        crate::keyvault::create_data_key(
            store.as_ref(),
            kms.as_ref(),
            &namespace,
            &key_arn,
            &key_name,
            kms_endpoint.as_deref(),
            &kms_region,
        )
    })
    .await
}
