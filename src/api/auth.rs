//! HTTP Basic authentication middleware
//!
//! When credentials are configured, every request except OPTIONS must carry
//! `Authorization: Basic base64(username:password)`. The comparison is
//! constant-time over the full header value.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

/// Shared auth configuration extracted from Config at startup.
#[derive(Clone)]
pub struct AuthConfig {
    expected: String,
}

impl AuthConfig {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        Self {
            expected: format!("Basic {}", encoded),
        }
    }

    /// Constant-time check of a raw `Authorization` header value.
    pub fn is_authorized(&self, header: &[u8]) -> bool {
        let expected = self.expected.as_bytes();
        header.len() == expected.len() && bool::from(header.ct_eq(expected))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").finish_non_exhaustive()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [
            (header::WWW_AUTHENTICATE, "Basic realm=\"webdav\""),
            (header::CONTENT_TYPE, "text/plain"),
        ],
        "Unauthorized",
    )
        .into_response()
}

/// Axum middleware that enforces Basic auth when credentials are configured.
///
/// Inserted as a layer around the router. If `auth` is `None` (no credentials
/// configured), all requests pass through unchanged.
pub async fn basic_auth_middleware(request: Request<Body>, next: Next) -> Response {
    // Auth config is stored in request extensions by the Extension layer
    let auth = request
        .extensions()
        .get::<Option<Arc<AuthConfig>>>()
        .cloned()
        .flatten();

    let Some(auth) = auth else {
        return next.run(request).await;
    };

    // CORS preflight and capability discovery come without credentials
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| auth.is_authorized(v.as_bytes()))
        .unwrap_or(false);

    if !authorized {
        debug!("Basic auth rejected {} {}", request.method(), request.uri().path());
        return unauthorized();
    }

    next.run(request).await
}
