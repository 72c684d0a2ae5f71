//! Core types for the WebDAV object-store bridge

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Custom-metadata entry that flags an object as a virtual collection.
pub const RESOURCETYPE_KEY: &str = "resourcetype";

/// Value of [`RESOURCETYPE_KEY`] for collections.
pub const COLLECTION_MARKER: &str = "<collection />";

/// Errors that can occur when resolving a request target into a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct KeyValidationError(String);

/// HTTP-level metadata the store keeps alongside the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

impl TransportMetadata {
    /// Capture the transport headers of an incoming request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };
        Self {
            content_type: get("content-type"),
            content_disposition: get("content-disposition"),
            content_encoding: get("content-encoding"),
            content_language: get("content-language"),
            cache_control: get("cache-control"),
        }
    }
}

/// The store's canonical record for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    /// Opaque content identity, unquoted
    pub etag: String,
    pub uploaded: DateTime<Utc>,
    #[serde(default)]
    pub transport: TransportMetadata,
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

impl StoredObject {
    /// True if the object is a virtual collection marker.
    pub fn is_collection(&self) -> bool {
        self.custom.get(RESOURCETYPE_KEY).map(String::as_str) == Some(COLLECTION_MARKER)
    }

    /// Last path segment of the key.
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Quoted entity tag for HTTP headers.
    pub fn http_etag(&self) -> String {
        format!("\"{}\"", self.etag)
    }
}

/// A request target resolved into a store key.
///
/// The key never begins or ends with `/`; the empty key is the virtual root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    pub key: String,
    /// Whether the original request path ended with `/`
    pub trailing_slash: bool,
}

impl ResourcePath {
    /// Resolve a raw (percent-encoded) URI path.
    pub fn from_uri_path(raw: &str) -> Result<Self, KeyValidationError> {
        let trailing_slash = raw.ends_with('/');
        let stripped = raw.strip_prefix('/').unwrap_or(raw);
        // Only literal slashes delimit; an encoded `%2F` at either edge is an empty segment
        let stripped = stripped.strip_suffix('/').unwrap_or(stripped);
        let key = urlencoding::decode(stripped)
            .map_err(|_| KeyValidationError("Path is not valid UTF-8".to_string()))?
            .into_owned();
        validate_key(&key)?;
        Ok(Self {
            key,
            trailing_slash,
        })
    }

    /// Resolve a `Destination` header value, either an absolute URL or an absolute path.
    pub fn from_destination(value: &str) -> Result<Self, KeyValidationError> {
        let uri: axum::http::Uri = value
            .trim()
            .parse()
            .map_err(|_| KeyValidationError("Destination is not a valid URI".to_string()))?;
        Self::from_uri_path(uri.path())
    }

    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Key of the immediate parent; the root's children have parent `""`.
    pub fn parent(&self) -> &str {
        parent_key(&self.key)
    }

    /// Last path segment.
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.key)
    }
}

/// Parent key of a normalized key (`""` for top-level keys and for the root).
pub fn parent_key(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

fn validate_key(key: &str) -> Result<(), KeyValidationError> {
    if key.contains('\0') {
        return Err(KeyValidationError(
            "Path must not contain NUL bytes".to_string(),
        ));
    }
    if key.is_empty() {
        return Ok(());
    }
    for segment in key.split('/') {
        if segment.is_empty() {
            return Err(KeyValidationError(
                "Path must not contain empty segments".to_string(),
            ));
        }
        if segment == "." || segment == ".." {
            return Err(KeyValidationError(
                "Path must not contain '.' or '..' segments".to_string(),
            ));
        }
    }
    Ok(())
}

/// Byte-range selector, mirroring what object stores accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=offset-` or `bytes=offset-last`
    Offset { offset: u64, length: Option<u64> },
    /// `bytes=-n`
    Suffix(u64),
}

impl ByteRange {
    /// Parse a single-range `Range` header. Multi-range and non-byte units yield `None`,
    /// which means the full body is served.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() {
            return end.parse().ok().map(ByteRange::Suffix);
        }
        let offset: u64 = start.parse().ok()?;
        if end.is_empty() {
            return Some(ByteRange::Offset {
                offset,
                length: None,
            });
        }
        let last: u64 = end.parse().ok()?;
        if last < offset {
            return None;
        }
        Some(ByteRange::Offset {
            offset,
            length: Some(last - offset + 1),
        })
    }

    /// Resolve against an object size into inclusive `(offset, end)` clamped to `[0, size-1]`.
    ///
    /// Returns `None` for an empty object or an offset past the end.
    pub fn resolve(&self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        let last = size - 1;
        match *self {
            ByteRange::Suffix(n) => {
                if n == 0 {
                    return None;
                }
                Some((size.saturating_sub(n), last))
            }
            ByteRange::Offset { offset, length } => {
                if offset > last {
                    return None;
                }
                let length = length.unwrap_or(size - offset);
                if length == 0 {
                    return None;
                }
                Some((offset, offset.saturating_add(length - 1).min(last)))
            }
        }
    }

    /// Header form used when forwarding to a store that speaks HTTP ranges.
    pub fn to_header(&self) -> String {
        match *self {
            ByteRange::Suffix(n) => format!("bytes=-{}", n),
            ByteRange::Offset {
                offset,
                length: None,
            } => format!("bytes={}-", offset),
            ByteRange::Offset {
                offset,
                length: Some(len),
            } => format!("bytes={}-{}", offset, offset + len.saturating_sub(1)),
        }
    }
}

/// Conditional request headers, forwarded verbatim to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditional {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub if_range: Option<String>,
}

impl Conditional {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        Self {
            if_match: get("if-match"),
            if_none_match: get("if-none-match"),
            if_modified_since: get("if-modified-since"),
            if_unmodified_since: get("if-unmodified-since"),
            if_range: get("if-range"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Format a timestamp as an HTTP date (RFC 1123).
pub fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resource_path_root() {
        let path = ResourcePath::from_uri_path("/").unwrap();
        assert!(path.is_root());
        assert!(path.trailing_slash);
    }

    #[test]
    fn test_resource_path_decodes_and_strips() {
        let path = ResourcePath::from_uri_path("/docs/My%20Files/").unwrap();
        assert_eq!(path.key, "docs/My Files");
        assert!(path.trailing_slash);
        assert_eq!(path.parent(), "docs");
        assert_eq!(path.basename(), "My Files");
    }

    #[test]
    fn test_resource_path_file() {
        let path = ResourcePath::from_uri_path("/a/b/c.txt").unwrap();
        assert_eq!(path.key, "a/b/c.txt");
        assert!(!path.trailing_slash);
        assert_eq!(path.parent(), "a/b");
    }

    #[test]
    fn test_resource_path_rejects_traversal() {
        assert!(ResourcePath::from_uri_path("/a/../b").is_err());
        assert!(ResourcePath::from_uri_path("/a/%2e%2e/b").is_err());
        assert!(ResourcePath::from_uri_path("/a%00b").is_err());
    }

    #[test]
    fn test_resource_path_rejects_empty_segments() {
        assert!(ResourcePath::from_uri_path("//x").is_err());
        assert!(ResourcePath::from_uri_path("/a//").is_err());
        assert!(ResourcePath::from_uri_path("/a//b").is_err());
        assert!(ResourcePath::from_uri_path("/%2Fx").is_err());
        assert!(ResourcePath::from_uri_path("/a%2F").is_err());
        assert!(ResourcePath::from_uri_path("/").unwrap().is_root());
        assert_eq!(ResourcePath::from_uri_path("/a/").unwrap().key, "a");
    }

    #[test]
    fn test_destination_absolute_url() {
        let path = ResourcePath::from_destination("http://example.com/dir/new%20name.txt").unwrap();
        assert_eq!(path.key, "dir/new name.txt");
        let path = ResourcePath::from_destination("/dir/sub/").unwrap();
        assert_eq!(path.key, "dir/sub");
    }

    #[test]
    fn test_byte_range_parse() {
        assert_eq!(
            ByteRange::parse("bytes=5-14"),
            Some(ByteRange::Offset {
                offset: 5,
                length: Some(10)
            })
        );
        assert_eq!(
            ByteRange::parse("bytes=5-"),
            Some(ByteRange::Offset {
                offset: 5,
                length: None
            })
        );
        assert_eq!(ByteRange::parse("bytes=-10"), Some(ByteRange::Suffix(10)));
        assert_eq!(ByteRange::parse("bytes=0-1,5-6"), None);
        assert_eq!(ByteRange::parse("items=0-1"), None);
        assert_eq!(ByteRange::parse("bytes=9-3"), None);
    }

    #[test]
    fn test_byte_range_resolve() {
        let range = ByteRange::Offset {
            offset: 5,
            length: Some(10),
        };
        assert_eq!(range.resolve(100), Some((5, 14)));
        assert_eq!(ByteRange::Suffix(10).resolve(100), Some((90, 99)));
        assert_eq!(ByteRange::Suffix(500).resolve(100), Some((0, 99)));
        let tail = ByteRange::Offset {
            offset: 95,
            length: Some(50),
        };
        assert_eq!(tail.resolve(100), Some((95, 99)));
        let past = ByteRange::Offset {
            offset: 100,
            length: None,
        };
        assert_eq!(past.resolve(100), None);
        assert_eq!(ByteRange::Suffix(1).resolve(0), None);
    }

    #[test]
    fn test_byte_range_header_form() {
        let range = ByteRange::Offset {
            offset: 5,
            length: Some(10),
        };
        assert_eq!(range.to_header(), "bytes=5-14");
        assert_eq!(ByteRange::Suffix(7).to_header(), "bytes=-7");
    }

    #[test]
    fn test_collection_flag() {
        let mut obj = StoredObject {
            key: "dir".to_string(),
            size: 0,
            etag: "e".to_string(),
            uploaded: Utc::now(),
            transport: TransportMetadata::default(),
            custom: HashMap::new(),
        };
        assert!(!obj.is_collection());
        obj.custom
            .insert(RESOURCETYPE_KEY.to_string(), COLLECTION_MARKER.to_string());
        assert!(obj.is_collection());
    }

    #[test]
    fn test_http_date_format() {
        let ts = DateTime::parse_from_rfc3339("1994-11-06T08:49:37Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(http_date(&ts), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    proptest! {
        #[test]
        fn prop_resolved_range_within_bounds(size in 1u64..10_000, offset in 0u64..12_000, len in 1u64..12_000) {
            let range = ByteRange::Offset { offset, length: Some(len) };
            if let Some((start, end)) = range.resolve(size) {
                prop_assert!(start <= end);
                prop_assert!(end < size);
                prop_assert!(end - start + 1 <= len);
            } else {
                prop_assert!(offset >= size);
            }
        }

        #[test]
        fn prop_resolved_key_has_no_edge_slashes(segments in proptest::collection::vec("[a-zA-Z0-9 _/-]{0,8}", 0..5), trailing in any::<bool>()) {
            let mut raw = format!("/{}", segments.join("/"));
            if trailing && !segments.is_empty() {
                raw.push('/');
            }
            if let Ok(path) = ResourcePath::from_uri_path(&raw) {
                prop_assert!(!path.key.starts_with('/'));
                prop_assert!(!path.key.ends_with('/'));
                prop_assert!(!path.key.contains("//"));
            }
        }
    }
}
