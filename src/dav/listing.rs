//! Lazy, cursor-driven enumeration of store keys

use crate::storage::{ListRequest, ObjectStore, StorageError};
use crate::types::StoredObject;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// How deep a listing reaches below its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Immediate children only (delimited by `/`)
    Shallow,
    /// Every descendant
    Recursive,
}

impl ListMode {
    fn delimiter(self) -> Option<String> {
        match self {
            ListMode::Shallow => Some("/".to_string()),
            ListMode::Recursive => None,
        }
    }
}

/// Page-by-page listing of `prefix`. The next page is only requested once the
/// previous one has been consumed; a truncated page without a cursor is an error.
pub fn list_pages(
    store: Arc<dyn ObjectStore>,
    prefix: String,
    mode: ListMode,
) -> BoxStream<'static, Result<Vec<StoredObject>, StorageError>> {
    // `None` once the final page has been yielded
    let start: Option<Option<String>> = Some(None);
    stream::try_unfold(start, move |state| {
        let store = store.clone();
        let prefix = prefix.clone();
        async move {
            let Some(cursor) = state else {
                return Ok(None);
            };
            let page = store
                .list(ListRequest {
                    prefix: prefix.clone(),
                    delimiter: mode.delimiter(),
                    cursor,
                    limit: None,
                })
                .await?;
            debug!(
                "Listed {} entries under {:?} (truncated: {})",
                page.objects.len(),
                prefix,
                page.truncated
            );
            let next = if page.truncated {
                match page.cursor {
                    Some(cursor) => Some(Some(cursor)),
                    None => {
                        return Err(StorageError::Other(format!(
                            "truncated listing of {:?} returned no cursor",
                            prefix
                        )))
                    }
                }
            } else {
                None
            };
            Ok(Some((page.objects, next)))
        }
    })
    .boxed()
}

/// Flattened entry stream over [`list_pages`].
pub fn list_entries(
    store: Arc<dyn ObjectStore>,
    prefix: String,
    mode: ListMode,
) -> BoxStream<'static, Result<StoredObject, StorageError>> {
    list_pages(store, prefix, mode)
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
}

/// Collect every entry under `prefix`.
pub async fn collect_entries(
    store: Arc<dyn ObjectStore>,
    prefix: String,
    mode: ListMode,
) -> Result<Vec<StoredObject>, StorageError> {
    list_entries(store, prefix, mode).try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ListPage, MemoryStore, PutOptions};
    use async_trait::async_trait;
    use bytes::Bytes;

    async fn seeded(page_size: usize, keys: &[&str]) -> Arc<dyn ObjectStore> {
        let store = MemoryStore::with_page_size(page_size);
        for key in keys {
            store
                .put(key, Bytes::new(), PutOptions::default())
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_recursive_listing_crosses_pages() {
        let store = seeded(2, &["a", "a/1", "a/2", "a/3", "a/b/4", "a/b/5", "c"]).await;
        let pages: Vec<_> = list_pages(store.clone(), "a/".to_string(), ListMode::Recursive)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(pages.len(), 3);

        let keys: Vec<String> = collect_entries(store, "a/".to_string(), ListMode::Recursive)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/1", "a/2", "a/3", "a/b/4", "a/b/5"]);
    }

    #[tokio::test]
    async fn test_shallow_listing() {
        let store = seeded(1, &["a", "a/1", "a/b", "a/b/4", "c"]).await;
        let keys: Vec<String> = collect_entries(store, "a/".to_string(), ListMode::Shallow)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/1", "a/b"]);
    }

    #[tokio::test]
    async fn test_empty_prefix() {
        let store = seeded(2, &[]).await;
        let entries = collect_entries(store, "x/".to_string(), ListMode::Recursive)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    struct CursorlessStore;

    #[async_trait]
    impl ObjectStore for CursorlessStore {
        async fn head(&self, _key: &str) -> Result<Option<StoredObject>, StorageError> {
            Ok(None)
        }
        async fn get(
            &self,
            _key: &str,
            _opts: crate::storage::GetOptions,
        ) -> Result<crate::storage::GetOutcome, StorageError> {
            Ok(crate::storage::GetOutcome::NotFound)
        }
        async fn put(
            &self,
            _key: &str,
            _body: Bytes,
            _opts: PutOptions,
        ) -> Result<StoredObject, StorageError> {
            Err(StorageError::Other("read-only".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn list(&self, _req: ListRequest) -> Result<ListPage, StorageError> {
            Ok(ListPage {
                objects: Vec::new(),
                cursor: None,
                truncated: true,
            })
        }
        fn kind(&self) -> &'static str {
            "cursorless"
        }
    }

    #[tokio::test]
    async fn test_truncated_without_cursor_is_error() {
        let result =
            collect_entries(Arc::new(CursorlessStore), String::new(), ListMode::Recursive).await;
        assert!(result.is_err());
    }
}
