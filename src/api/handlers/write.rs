//! PUT, MKCOL and DELETE

use super::AppState;
use crate::api::errors::DavError;
use crate::api::extractors::DavPath;
use crate::api::hval;
use crate::dav::hierarchy::{child_prefix, parent_exists, parent_is_collection};
use crate::dav::is_placeholder;
use crate::dav::transfer::delete_prefix;
use crate::storage::PutOptions;
use crate::types::{Conditional, TransportMetadata, COLLECTION_MARKER, RESOURCETYPE_KEY};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Buffer a request body, refusing anything above `limit` bytes.
async fn read_body(request: Request, limit: u64) -> Result<Bytes, DavError> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |len| len > limit) {
        return Err(DavError::PayloadTooLarge);
    }
    let mut stream = request.into_body().into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| DavError::BadRequest(format!("Failed to read request body: {}", e)))?
    {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(DavError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Transport metadata for an upload, guessing the type from the extension
/// when the client sent none.
fn upload_metadata(headers: &HeaderMap, key: &str) -> TransportMetadata {
    let mut transport = TransportMetadata::from_headers(headers);
    if transport.content_type.is_none() {
        transport.content_type = mime_guess::from_path(key).first_raw().map(str::to_string);
    }
    transport
}

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_put(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    request: Request,
) -> Result<Response, DavError> {
    if path.trailing_slash || path.is_root() {
        return Err(DavError::MethodNotAllowed);
    }
    if is_placeholder(&path) {
        debug!("Ignoring upload of platform placeholder {}", path);
        return Ok(StatusCode::CREATED.into_response());
    }
    if !parent_is_collection(state.store.as_ref(), &path.key).await? {
        return Err(DavError::Conflict(format!(
            "parent of {} is not a collection",
            path
        )));
    }

    let headers = request.headers().clone();
    let body = read_body(request, state.max_object_size).await?;
    let opts = PutOptions {
        transport: upload_metadata(&headers, &path.key),
        custom: HashMap::new(),
        conditional: Conditional::from_headers(&headers),
    };
    let stored = state.store.put(&path.key, body, opts).await?;
    info!("PUT {} ({} bytes)", path, stored.size);

    Ok((
        StatusCode::CREATED,
        [(header::ETAG, hval(&stored.http_etag()))],
    )
        .into_response())
}

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_mkcol(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    headers: HeaderMap,
) -> Result<Response, DavError> {
    if path.is_root() {
        return Err(DavError::MethodNotAllowed);
    }
    if is_placeholder(&path) {
        return Ok(StatusCode::CREATED.into_response());
    }
    if state.store.head(&path.key).await?.is_some() {
        return Err(DavError::MethodNotAllowed);
    }
    if !parent_exists(state.store.as_ref(), &path.key).await? {
        return Err(DavError::Conflict(format!("parent of {} does not exist", path)));
    }

    let mut custom = HashMap::new();
    custom.insert(RESOURCETYPE_KEY.to_string(), COLLECTION_MARKER.to_string());
    // Some clients send a body with MKCOL; it is ignored
    let opts = PutOptions {
        transport: TransportMetadata::from_headers(&headers),
        custom,
        conditional: Conditional::default(),
    };
    state.store.put(&path.key, Bytes::new(), opts).await?;
    info!("MKCOL {}", path);
    Ok(StatusCode::CREATED.into_response())
}

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
) -> Result<Response, DavError> {
    if path.is_root() {
        let deleted = delete_prefix(state.store.clone(), "").await?;
        info!("DELETE / removed {} objects", deleted);
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    if is_placeholder(&path) {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let Some(existing) = state.store.head(&path.key).await? else {
        return Err(DavError::NotFound);
    };
    state.store.delete(&path.key).await?;
    if existing.is_collection() {
        let deleted = delete_prefix(state.store.clone(), &child_prefix(&path.key)).await?;
        info!("DELETE {} removed {} descendants", path, deleted);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
