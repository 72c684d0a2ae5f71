//! Custom Axum extractors for WebDAV request targets and headers
//!
//! These extractors resolve the request path and parse the DAV-specific
//! headers, keeping that parsing out of the handlers.

use super::errors::DavError;
use crate::types::ResourcePath;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Request target resolved into a store key
///
/// # Example
/// ```ignore
/// async fn handle_get(DavPath(path): DavPath) -> Result<Response, DavError> {
///     // path.key has no leading or trailing slash
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DavPath(pub ResourcePath);

impl std::ops::Deref for DavPath {
    type Target = ResourcePath;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DavPath
where
    S: Send + Sync,
{
    type Rejection = DavError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(DavPath(ResourcePath::from_uri_path(parts.uri.path())?))
    }
}

/// Value of the `Depth` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

/// Raw `Depth` header. Handlers differ in how they reject invalid values,
/// so parsing is deferred to [`DepthHeader::depth`].
#[derive(Debug, Clone, Default)]
pub struct DepthHeader(pub Option<String>);

impl DepthHeader {
    /// Parsed depth; an absent header means `infinity`, an invalid one `None`.
    pub fn depth(&self) -> Option<Depth> {
        match self.0.as_deref().map(str::trim) {
            None => Some(Depth::Infinity),
            Some("0") => Some(Depth::Zero),
            Some("1") => Some(Depth::One),
            Some(v) if v.eq_ignore_ascii_case("infinity") => Some(Depth::Infinity),
            Some(_) => None,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DepthHeader
where
    S: Send + Sync,
{
    type Rejection = DavError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("depth")
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        Ok(DepthHeader(value))
    }
}

/// `Overwrite` header: `Some(true)` for `T`, `Some(false)` for `F`, else `None`
#[derive(Debug, Clone, Copy, Default)]
pub struct Overwrite(pub Option<bool>);

#[async_trait]
impl<S> FromRequestParts<S> for Overwrite
where
    S: Send + Sync,
{
    type Rejection = DavError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = match parts.headers.get("overwrite").map(|v| v.as_bytes()) {
            Some(b"T") | Some(b"t") => Some(true),
            Some(b"F") | Some(b"f") => Some(false),
            _ => None,
        };
        Ok(Overwrite(value))
    }
}

/// `Destination` header resolved the same way as the request path.
/// Missing or unparseable destinations are rejected with 400.
#[derive(Debug, Clone)]
pub struct Destination(pub ResourcePath);

#[async_trait]
impl<S> FromRequestParts<S> for Destination
where
    S: Send + Sync,
{
    type Rejection = DavError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("destination")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| DavError::BadRequest("Missing Destination header".to_string()))?;
        Ok(Destination(ResourcePath::from_destination(raw)?))
    }
}
