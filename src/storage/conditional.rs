//! Precondition and range evaluation shared by the local adapters
//!
//! The S3 adapter forwards these headers to the service instead.

use super::traits::StorageError;
use crate::types::{ByteRange, Conditional, StoredObject};
use chrono::{DateTime, Utc};

/// Strip weak prefix and quotes so etags compare by opaque value.
fn normalize_etag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}

/// True if `list` (a header value: `*` or comma-separated etags) names `etag`.
pub(crate) fn etag_matches(list: &str, etag: &str) -> bool {
    list.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// HTTP dates have second granularity.
fn modified_after(obj: &StoredObject, date: &DateTime<Utc>) -> bool {
    obj.uploaded.timestamp() > date.timestamp()
}

/// Whether a read of `obj` may proceed under `cond`.
pub(crate) fn read_allowed(cond: &Conditional, obj: &StoredObject) -> bool {
    if let Some(list) = &cond.if_match {
        if !etag_matches(list, &obj.etag) {
            return false;
        }
    } else if let Some(date) = cond.if_unmodified_since.as_deref().and_then(parse_http_date) {
        if modified_after(obj, &date) {
            return false;
        }
    }

    if let Some(list) = &cond.if_none_match {
        if etag_matches(list, &obj.etag) {
            return false;
        }
    } else if let Some(date) = cond.if_modified_since.as_deref().and_then(parse_http_date) {
        if !modified_after(obj, &date) {
            return false;
        }
    }

    true
}

/// Whether a write over `existing` may proceed under `cond`.
pub(crate) fn write_allowed(cond: &Conditional, existing: Option<&StoredObject>) -> bool {
    if let Some(list) = &cond.if_match {
        match existing {
            Some(obj) if etag_matches(list, &obj.etag) => {}
            _ => return false,
        }
    }
    if let (Some(list), Some(obj)) = (&cond.if_none_match, existing) {
        if etag_matches(list, &obj.etag) {
            return false;
        }
    }
    if let (Some(date), Some(obj)) = (
        cond.if_unmodified_since.as_deref().and_then(parse_http_date),
        existing,
    ) {
        if modified_after(obj, &date) {
            return false;
        }
    }
    true
}

/// `If-Range` holds when absent, when its etag matches strongly, or when its
/// date is not older than the object.
fn if_range_holds(cond: &Conditional, obj: &StoredObject) -> bool {
    let Some(value) = cond.if_range.as_deref() else {
        return true;
    };
    match parse_http_date(value) {
        Some(date) => !modified_after(obj, &date),
        None => !value.trim().starts_with("W/") && normalize_etag(value) == obj.etag,
    }
}

/// Decide which inclusive byte range of `obj` to serve.
///
/// `None` means the full body. An offset past the end of a non-empty object is an error.
pub(crate) fn applied_range(
    range: Option<ByteRange>,
    cond: &Conditional,
    obj: &StoredObject,
) -> Result<Option<(u64, u64)>, StorageError> {
    let Some(range) = range else {
        return Ok(None);
    };
    if !if_range_holds(cond, obj) || obj.size == 0 {
        return Ok(None);
    }
    match range.resolve(obj.size) {
        Some(resolved) => Ok(Some(resolved)),
        None => Err(StorageError::InvalidRange { size: obj.size }),
    }
}
