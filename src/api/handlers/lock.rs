//! LOCK and UNLOCK
//!
//! Clients such as the Windows and macOS redirectors refuse to write without
//! a LOCK handshake. Tokens are issued but never recorded or checked.

use super::AppState;
use crate::api::errors::DavError;
use crate::api::extractors::DavPath;
use crate::api::hval;
use crate::api::xml::{lock_discovery, parse_lock_owner};
use crate::dav::hierarchy::parent_exists;
use crate::dav::{href, is_placeholder};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_lock(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    body: Bytes,
) -> Result<Response, DavError> {
    let token = format!("urn:uuid:{}", Uuid::new_v4());
    let owner = parse_lock_owner(&body);

    let present = if path.is_root() {
        true
    } else if is_placeholder(&path) {
        false
    } else {
        state.store.head(&path.key).await?.is_some()
            || parent_exists(state.store.as_ref(), &path.key).await?
    };
    let status = if present {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    debug!("Issued lock token {} ({})", token, status);

    let root = href(&path.key, path.trailing_slash || path.is_root());
    Ok((
        status,
        [
            (header::CONTENT_TYPE, hval("application/xml; charset=utf-8")),
            (
                header::HeaderName::from_static("lock-token"),
                hval(&format!("<{}>", token)),
            ),
        ],
        lock_discovery(&token, &root, owner.as_deref()),
    )
        .into_response())
}

pub async fn handle_unlock() -> StatusCode {
    StatusCode::NO_CONTENT
}
