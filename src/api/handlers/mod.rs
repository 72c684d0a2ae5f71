//! WebDAV method handlers
//!
//! Split into submodules by domain:
//! - `read`: GET and HEAD (file download, directory index)
//! - `write`: PUT, MKCOL, DELETE
//! - `transfer`: COPY and MOVE
//! - `props`: PROPFIND and PROPPATCH
//! - `lock`: LOCK and UNLOCK compliance stubs

mod lock;
mod props;
mod read;
mod transfer;
mod write;

use super::errors::DavError;
use super::{hval, ALLOWED_METHODS, DAV_CLASS};
use crate::storage::ObjectStore;
use axum::extract::{Request, State};
use axum::handler::Handler;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::info;

pub use lock::{handle_lock, handle_unlock};
pub use props::{handle_propfind, handle_proppatch};
pub use read::{handle_get, handle_head};
pub use transfer::{handle_copy, handle_move};
pub use write::{handle_delete, handle_mkcol, handle_put};

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    /// Upper bound for buffered request bodies
    pub max_object_size: u64,
    /// Cap on in-flight copies during recursive COPY/MOVE
    pub copy_concurrency: Option<usize>,
}

/// Route a request to its method handler. WebDAV verbs are extension
/// methods, so dispatch is on the method string rather than the router.
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().as_str().to_string();
    info!("{} {}", method, request.uri().path());

    match method.as_str() {
        "OPTIONS" => handle_options().await,
        "GET" => handle_get.call(request, state).await,
        "HEAD" => handle_head.call(request, state).await,
        "PUT" => handle_put.call(request, state).await,
        "MKCOL" => handle_mkcol.call(request, state).await,
        "DELETE" => handle_delete.call(request, state).await,
        "COPY" => handle_copy.call(request, state).await,
        "MOVE" => handle_move.call(request, state).await,
        "PROPFIND" => handle_propfind.call(request, state).await,
        "PROPPATCH" => handle_proppatch.call(request, state).await,
        "LOCK" => handle_lock.call(request, state).await,
        "UNLOCK" => handle_unlock.call(request, state).await,
        _ => {
            let mut response = DavError::MethodNotAllowed.into_response();
            response
                .headers_mut()
                .insert(header::HeaderName::from_static("dav"), hval(DAV_CLASS));
            response
        }
    }
}

/// OPTIONS: advertise methods and compliance class
pub async fn handle_options() -> Response {
    (
        StatusCode::OK,
        [
            (header::ALLOW, hval(&ALLOWED_METHODS.join(", "))),
            (header::HeaderName::from_static("dav"), hval(DAV_CLASS)),
            (header::HeaderName::from_static("ms-author-via"), hval("DAV")),
            (header::CONTENT_LENGTH, hval("0")),
        ],
    )
        .into_response()
}

/// `text/xml` 207 Multi-Status response
fn multistatus_response(xml: String) -> Response {
    (
        StatusCode::MULTI_STATUS,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        xml,
    )
        .into_response()
}
