//! Filesystem-based object store with JSON metadata records

use super::conditional::{applied_range, read_allowed, write_allowed};
use super::traits::{
    GetOptions, GetOutcome, ListPage, ListRequest, ObjectBody, ObjectStore, PutOptions,
    StorageError,
};
use crate::types::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use md5::{Digest, Md5};
use std::io::{SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

/// Async-safe path existence check (avoids blocking the Tokio runtime)
async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Listing page size, matching S3's ListObjectsV2 maximum.
const PAGE_SIZE: usize = 1000;

/// ENOSPC raw error code on Linux and macOS.
const ENOSPC: i32 = 28;

/// Convert an io::Error into StorageError, detecting disk-full (ENOSPC).
fn io_to_storage_error(e: std::io::Error) -> StorageError {
    if e.raw_os_error() == Some(ENOSPC) {
        StorageError::DiskFull
    } else {
        StorageError::Io(e)
    }
}

/// Atomically write data to a file using write-to-temp + fsync + rename.
async fn atomic_write(path: &Path, data: Bytes) -> Result<(), StorageError> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::Other("Cannot atomic-write to a path with no parent".into()))?
        .to_path_buf();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut tmp = NamedTempFile::new_in(&parent).map_err(io_to_storage_error)?;
        tmp.write_all(&data).map_err(io_to_storage_error)?;
        tmp.as_file().sync_all().map_err(io_to_storage_error)?;
        tmp.persist(&path)
            .map_err(|e| io_to_storage_error(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| StorageError::Other(format!("spawn_blocking join failed: {}", e)))?
}

/// Remove a file, treating an already-missing file as success.
async fn remove_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_to_storage_error(e)),
    }
}

/// Map a key to a single flat file name. A leading dot is escaped so no
/// key can name `.`, `..` or a temp file.
fn encode_key(key: &str) -> String {
    let encoded = urlencoding::encode(key).into_owned();
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded,
    }
}

fn decode_key(name: &str) -> Option<String> {
    urlencoding::decode(name).ok().map(|k| k.into_owned())
}

/// Filesystem object store
///
/// Storage layout:
/// ```text
/// {root}/objects/{encoded key}        # Object body
/// {root}/meta/{encoded key}.json      # StoredObject record
/// ```
///
/// Keys are percent-encoded into flat file names, so the store stays flat
/// like the object stores it stands in for; the hierarchy is virtual.
pub struct FilesystemStore {
    /// Root directory for all data
    root: PathBuf,
    page_size: usize,
}

impl FilesystemStore {
    /// Create a new filesystem store with the given root directory.
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(root.join("objects")).await?;
        fs::create_dir_all(root.join("meta")).await?;
        Ok(Self {
            root,
            page_size: PAGE_SIZE,
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(encode_key(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root
            .join("meta")
            .join(format!("{}.json", encode_key(key)))
    }

    async fn read_record(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.meta_path(key);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_to_storage_error(e)),
        }
    }

    /// All stored keys, sorted.
    async fn all_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(self.root.join("meta")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => warn!("Skipping undecodable metadata file {}", name),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    #[instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        self.read_record(key).await
    }

    #[instrument(skip(self, opts))]
    async fn get(&self, key: &str, opts: GetOptions) -> Result<GetOutcome, StorageError> {
        let Some(object) = self.read_record(key).await? else {
            return Ok(GetOutcome::NotFound);
        };
        if !read_allowed(&opts.conditional, &object) {
            return Ok(GetOutcome::PreconditionFailed(object));
        }
        let range = applied_range(opts.range, &opts.conditional, &object)?;

        let data_path = self.object_path(key);
        if !path_exists(&data_path).await {
            return Ok(GetOutcome::NotFound);
        }
        let mut file = fs::File::open(&data_path).await?;
        let body = match range {
            Some((start, end)) => {
                file.seek(SeekFrom::Start(start)).await?;
                ReaderStream::new(file.take(end - start + 1))
                    .map(|result| result.map_err(StorageError::Io))
                    .boxed()
            }
            None => ReaderStream::new(file)
                .map(|result| result.map_err(StorageError::Io))
                .boxed(),
        };
        debug!("Opened file stream for {} (range {:?})", key, range);
        Ok(GetOutcome::Found(ObjectBody {
            object,
            range,
            body,
        }))
    }

    #[instrument(skip(self, body, opts), fields(size = body.len()))]
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StorageError> {
        let existing = self.read_record(key).await?;
        if !write_allowed(&opts.conditional, existing.as_ref()) {
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
        let record = Bytes::from(serde_json::to_vec(&object)?);

        atomic_write(&self.object_path(key), body).await?;
        atomic_write(&self.meta_path(key), record).await?;
        debug!("Wrote {} ({} bytes)", key, object.size);
        Ok(object)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // Record first so a partial delete never leaves a listed key without a body
        remove_if_present(&self.meta_path(key)).await?;
        remove_if_present(&self.object_path(key)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, req: ListRequest) -> Result<ListPage, StorageError> {
        let limit = req.limit.unwrap_or(self.page_size).min(self.page_size).max(1);
        let keys = self.all_keys().await?;
        let mut matching = keys
            .into_iter()
            .filter(|key| key.starts_with(&req.prefix))
            .filter(|key| req.cursor.as_ref().map_or(true, |c| key > c))
            .filter(|key| match &req.delimiter {
                Some(delim) => !key[req.prefix.len()..].contains(delim.as_str()),
                None => true,
            });

        let page_keys: Vec<String> = matching.by_ref().take(limit).collect();
        let truncated = matching.next().is_some();

        let mut objects = Vec::with_capacity(page_keys.len());
        for key in &page_keys {
            // Deleted between the directory scan and the read
            if let Some(obj) = self.read_record(key).await? {
                objects.push(obj);
            }
        }
        let cursor = if truncated { page_keys.last().cloned() } else { None };
        Ok(ListPage {
            objects,
            cursor,
            truncated,
        })
    }

    fn kind(&self) -> &'static str {
        "filesystem"
    }
}
