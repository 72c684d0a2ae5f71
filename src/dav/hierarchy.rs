//! Virtual directory hierarchy over flat keys
//!
//! A collection is an ordinary zero-length object whose custom metadata
//! carries the collection marker; its children are the keys under `key + "/"`.

use crate::storage::{ObjectStore, StorageError};
use crate::types::{parent_key, ResourcePath};

/// Names that OS file managers create and probe for on every network share.
const PLATFORM_NAMES: &[&str] = &[".DS_Store", ".Trashes", ".TemporaryItems", ".fseventsd"];

/// Classification of a request target before it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Ordinary,
    /// OS-generated metadata path, answered synthetically and never stored
    PlatformPlaceholder,
}

impl PathClass {
    pub fn of(key: &str) -> Self {
        let placeholder = key
            .split('/')
            .any(|segment| segment.starts_with("._") || PLATFORM_NAMES.contains(&segment));
        if placeholder {
            PathClass::PlatformPlaceholder
        } else {
            PathClass::Ordinary
        }
    }
}

/// True if the request target is an OS-generated placeholder path.
pub fn is_placeholder(path: &ResourcePath) -> bool {
    PathClass::of(&path.key) == PathClass::PlatformPlaceholder
}

/// Listing prefix for the children of `key`.
pub fn child_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key)
    }
}

/// True if `key` is `ancestor` itself or lies below it.
pub fn is_within(key: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || key == ancestor
        || key
            .strip_prefix(ancestor)
            .map_or(false, |rest| rest.starts_with('/'))
}

/// Replace the `from` prefix of `key` with `to`.
pub fn rebase_key(key: &str, from: &str, to: &str) -> String {
    match key.strip_prefix(from) {
        Some(rest) if !from.is_empty() => format!("{}{}", to, rest),
        _ => key.to_string(),
    }
}

/// True if the parent of `key` is the root or an existing object.
pub async fn parent_exists(store: &dyn ObjectStore, key: &str) -> Result<bool, StorageError> {
    let parent = parent_key(key);
    if parent.is_empty() {
        return Ok(true);
    }
    Ok(store.head(parent).await?.is_some())
}

/// True if the parent of `key` is the root or an existing collection.
pub async fn parent_is_collection(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<bool, StorageError> {
    let parent = parent_key(key);
    if parent.is_empty() {
        return Ok(true);
    }
    Ok(store
        .head(parent)
        .await?
        .map_or(false, |obj| obj.is_collection()))
}
