//! Recursive structural operations: fan-out copy and prefix deletion

use super::listing::{list_pages, ListMode};
use crate::storage::{GetOptions, GetOutcome, ObjectStore, PutOptions, StorageError};
use crate::types::StoredObject;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// Fetch the full body and record of `key`.
async fn read_object(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<(StoredObject, Bytes), StorageError> {
    let found = match store.get(key, GetOptions::default()).await? {
        GetOutcome::Found(found) => found,
        GetOutcome::NotFound | GetOutcome::PreconditionFailed(_) => {
            return Err(StorageError::NotFound(key.to_string()))
        }
    };
    let body = found
        .body
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?
        .freeze();
    Ok((found.object, body))
}

/// Copy one object's body and both metadata blocks to a new key.
#[instrument(skip(store))]
pub async fn copy_object(store: &dyn ObjectStore, from: &str, to: &str) -> Result<(), StorageError> {
    let (object, body) = read_object(store, from).await?;
    store
        .put(
            to,
            body,
            PutOptions {
                transport: object.transport,
                custom: object.custom,
                conditional: Default::default(),
            },
        )
        .await?;
    Ok(())
}

/// Rewrite an object in place with a new custom-metadata map, keeping its
/// body and transport metadata.
#[instrument(skip(store, custom))]
pub async fn replace_custom_metadata(
    store: &dyn ObjectStore,
    key: &str,
    custom: HashMap<String, String>,
) -> Result<StoredObject, StorageError> {
    let (object, body) = read_object(store, key).await?;
    store
        .put(
            key,
            body,
            PutOptions {
                transport: object.transport,
                custom,
                conditional: Default::default(),
            },
        )
        .await
}

/// Run every `(from, to)` copy concurrently, optionally capped at `limit`
/// in flight. All copies settle before the first failure is returned;
/// copies that already completed are left in place.
pub async fn copy_all(
    store: Arc<dyn ObjectStore>,
    pairs: Vec<(String, String)>,
    limit: Option<usize>,
) -> Result<(), StorageError> {
    let permits = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let count = pairs.len();
    let mut tasks = JoinSet::new();

    for (from, to) in pairs {
        let store = store.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = match permits {
                Some(sem) => Some(
                    sem.acquire_owned()
                        .await
                        .map_err(|e| StorageError::Other(format!("copy limiter closed: {}", e)))?,
                ),
                None => None,
            };
            copy_object(store.as_ref(), &from, &to).await
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined
            .map_err(|e| StorageError::Other(format!("copy task failed: {}", e)))
            .and_then(|r| r);
        if let Err(e) = result {
            warn!("Copy sub-operation failed: {}", e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            debug!("Copied {} objects", count);
            Ok(())
        }
    }
}

/// Delete every key under `prefix` page by page. An empty prefix empties the store.
#[instrument(skip(store))]
pub async fn delete_prefix(store: Arc<dyn ObjectStore>, prefix: &str) -> Result<usize, StorageError> {
    let mut pages = list_pages(store.clone(), prefix.to_string(), ListMode::Recursive);
    let mut deleted = 0;
    while let Some(page) = pages.try_next().await? {
        let keys: Vec<String> = page.into_iter().map(|obj| obj.key).collect();
        if keys.is_empty() {
            continue;
        }
        store.delete_many(&keys).await?;
        deleted += keys.len();
    }
    debug!("Deleted {} objects under {:?}", deleted, prefix);
    Ok(deleted)
}
