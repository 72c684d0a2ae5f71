//! bucketdav - WebDAV server over a flat, key-addressed object store
//!
//! Directories are emulated with marker objects; listings follow the
//! store's pagination cursors.

pub mod api;
pub mod config;
pub mod dav;
pub mod storage;
pub mod types;
