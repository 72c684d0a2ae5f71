//! Object store abstraction and adapters

mod conditional;
mod filesystem;
mod memory;
mod s3;
mod traits;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use traits::{
    BodyStream, GetOptions, GetOutcome, ListPage, ListRequest, ObjectBody, ObjectStore,
    PutOptions, StorageError,
};

use crate::config::BackendConfig;
use std::sync::Arc;
use tracing::info;

/// Construct the configured adapter.
pub async fn build_store(config: &BackendConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let store: Arc<dyn ObjectStore> = match config {
        BackendConfig::Memory { page_size } => Arc::new(MemoryStore::with_page_size(*page_size)),
        BackendConfig::Filesystem { path } => Arc::new(FilesystemStore::new(path.clone()).await?),
        BackendConfig::S3 { .. } => Arc::new(S3Store::new(config)?),
    };
    info!("Using {} object store", store.kind());
    Ok(store)
}
