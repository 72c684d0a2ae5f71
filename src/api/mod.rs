//! WebDAV HTTP surface

mod auth;
mod errors;
mod extractors;
pub mod handlers;
mod xml;

pub use auth::{basic_auth_middleware, AuthConfig};
pub use errors::DavError;
pub use extractors::{DavPath, Depth, DepthHeader, Destination, Overwrite};

use crate::config::Config;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{middleware, Extension, Router};
use handlers::{dispatch, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// WebDAV compliance classes advertised in the `DAV` header.
pub const DAV_CLASS: &str = "1, 2, 3";

/// Methods listed in `Allow`.
pub const ALLOWED_METHODS: &[&str] = &[
    "OPTIONS",
    "PROPFIND",
    "PROPPATCH",
    "MKCOL",
    "GET",
    "HEAD",
    "PUT",
    "DELETE",
    "COPY",
    "MOVE",
    "LOCK",
    "UNLOCK",
];

const CORS_ALLOW_HEADERS: &[&str] = &[
    "authorization",
    "content-type",
    "depth",
    "overwrite",
    "destination",
    "range",
];

const CORS_EXPOSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "dav",
    "etag",
    "last-modified",
    "location",
    "date",
    "content-range",
];

/// Header value from a string, empty if it contains bytes HTTP forbids.
pub(crate) fn hval(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn cors_layer() -> CorsLayer {
    let methods: Vec<Method> = ALLOWED_METHODS
        .iter()
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(methods)
        .allow_headers(
            CORS_ALLOW_HEADERS
                .iter()
                .copied()
                .map(HeaderName::from_static)
                .collect::<Vec<_>>(),
        )
        .expose_headers(
            CORS_EXPOSE_HEADERS
                .iter()
                .copied()
                .map(HeaderName::from_static)
                .collect::<Vec<_>>(),
        )
        .max_age(Duration::from_secs(86400))
}

/// Build the application router. Every path and method goes through
/// [`dispatch`]; auth, CORS, tracing and the body limit wrap it as layers.
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    let auth = match (&config.username, &config.password) {
        (Some(user), Some(pass)) if config.auth_enabled() => {
            Some(Arc::new(AuthConfig::new(user, pass)))
        }
        _ => None,
    };
    let body_limit = usize::try_from(config.max_object_size).unwrap_or(usize::MAX);

    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(middleware::from_fn(basic_auth_middleware))
        .layer(Extension(auth))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}
