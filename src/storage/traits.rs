//! Object store adapter contract

use crate::types::{ByteRange, Conditional, StoredObject, TransportMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Range not satisfiable for object of {size} bytes")]
    InvalidRange { size: u64 },

    #[error("Insufficient storage: disk full")]
    DiskFull,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Storage error: {0}")]
    Other(String),
}

/// Byte stream of an object body.
pub type BodyStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Options for [`ObjectStore::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub range: Option<ByteRange>,
    pub conditional: Conditional,
}

/// Options for [`ObjectStore::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub transport: TransportMetadata,
    pub custom: HashMap<String, String>,
    pub conditional: Conditional,
}

/// A fetched object: its record, the range actually applied, and the body.
pub struct ObjectBody {
    pub object: StoredObject,
    /// Inclusive `(offset, end)` when a range was honored, `None` for the full body
    pub range: Option<(u64, u64)>,
    pub body: BodyStream,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("object", &self.object)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Result of a conditional, possibly ranged fetch.
#[derive(Debug)]
pub enum GetOutcome {
    NotFound,
    /// Preconditions did not hold; the metadata is returned without a body
    PreconditionFailed(StoredObject),
    Found(ObjectBody),
}

/// One listing request. `delimiter` of `/` yields a shallow listing.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

/// One page of listing results.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<StoredObject>,
    pub cursor: Option<String>,
    pub truncated: bool,
}

/// Abstract key-addressed object store with cursor-paginated listing.
///
/// This trait is object-safe and is used as `Arc<dyn ObjectStore>`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the metadata record of a key
    async fn head(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Fetch a body, honoring range and conditional headers
    async fn get(&self, key: &str, opts: GetOptions) -> Result<GetOutcome, StorageError>;

    /// Store a body with both metadata blocks
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StorageError>;

    /// Delete a single key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Delete a batch of keys
    async fn delete_many(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// List one page of objects under a prefix
    async fn list(&self, req: ListRequest) -> Result<ListPage, StorageError>;

    /// Name of the adapter, for logging
    fn kind(&self) -> &'static str;
}
