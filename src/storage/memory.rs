//! In-memory object store, used for tests and ephemeral deployments

use super::conditional::{applied_range, read_allowed, write_allowed};
use super::traits::{
    GetOptions, GetOutcome, ListPage, ListRequest, ObjectBody, ObjectStore, PutOptions,
    StorageError,
};
use crate::types::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::{debug, instrument};

/// Objects kept in a sorted map so listing order matches key order.
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, (StoredObject, Bytes)>>,
    page_size: usize,
}

impl MemoryStore {
    /// Default number of entries returned per listing page.
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    pub fn new() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }

    /// A small page size forces every listing through the cursor path.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    #[instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        Ok(self.objects.read().get(key).map(|(obj, _)| obj.clone()))
    }

    #[instrument(skip(self, opts))]
    async fn get(&self, key: &str, opts: GetOptions) -> Result<GetOutcome, StorageError> {
        let Some((object, data)) = self.objects.read().get(key).cloned() else {
            return Ok(GetOutcome::NotFound);
        };
        if !read_allowed(&opts.conditional, &object) {
            debug!("Precondition failed for {}", key);
            return Ok(GetOutcome::PreconditionFailed(object));
        }
        let range = applied_range(opts.range, &opts.conditional, &object)?;
        let slice = match range {
            Some((start, end)) => data.slice(start as usize..=end as usize),
            None => data,
        };
        Ok(GetOutcome::Found(ObjectBody {
            object,
            range,
            body: Box::pin(futures::stream::once(async move { Ok(slice) })),
        }))
    }

    #[instrument(skip(self, body, opts), fields(size = body.len()))]
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StorageError> {
        let mut objects = self.objects.write();
        let existing = objects.get(key).map(|(obj, _)| obj);
        if !write_allowed(&opts.conditional, existing) {
            return Err(StorageError::PreconditionFailed(key.to_string()));
        }
        let object = StoredObject {
            key: key.to_string(),
            size: body.len() as u64,
            etag: hex::encode(Md5::digest(&body)),
            uploaded: Utc::now(),
            transport: opts.transport,
            custom: opts.custom,
        };
        objects.insert(key.to_string(), (object.clone(), body));
        debug!("Stored {} ({} bytes)", key, object.size);
        Ok(object)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut objects = self.objects.write();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, req: ListRequest) -> Result<ListPage, StorageError> {
        let limit = req.limit.unwrap_or(self.page_size).min(self.page_size).max(1);
        let lower = match &req.cursor {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Included(req.prefix.clone()),
        };
        let objects = self.objects.read();
        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&req.prefix))
            .filter(|(key, _)| match &req.delimiter {
                Some(delim) => !key[req.prefix.len()..].contains(delim.as_str()),
                None => true,
            })
            .map(|(_, (obj, _))| obj);

        let page: Vec<StoredObject> = matching.by_ref().take(limit).cloned().collect();
        let truncated = matching.next().is_some();
        let cursor = if truncated {
            page.last().map(|obj| obj.key.clone())
        } else {
            None
        };
        Ok(ListPage {
            objects: page,
            cursor,
            truncated,
        })
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
