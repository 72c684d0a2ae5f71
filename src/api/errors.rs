//! WebDAV error type and plain-text responses

use super::ALLOWED_METHODS;
use crate::storage::StorageError;
use crate::types::KeyValidationError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Errors surfaced to WebDAV clients
#[derive(Debug, Error)]
pub enum DavError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Bad Request: malformed XML body")]
    MalformedXml,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition Failed")]
    PreconditionFailed,

    #[error("Payload Too Large")]
    PayloadTooLarge,

    #[error("Range Not Satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("Storage failure: {0}")]
    Storage(StorageError),
}

impl DavError {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            DavError::BadRequest(_) | DavError::MalformedXml => StatusCode::BAD_REQUEST,
            DavError::Forbidden(_) => StatusCode::FORBIDDEN,
            DavError::NotFound => StatusCode::NOT_FOUND,
            DavError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DavError::Conflict(_) => StatusCode::CONFLICT,
            DavError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            DavError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DavError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            DavError::Storage(StorageError::DiskFull) => StatusCode::INSUFFICIENT_STORAGE,
            DavError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DavError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Reason phrase only; adapter detail stays in the log
        let body = status.canonical_reason().unwrap_or("Error").to_string();

        match &self {
            DavError::Storage(e) => error!("Storage failure: {}", e),
            DavError::BadRequest(reason)
            | DavError::Forbidden(reason)
            | DavError::Conflict(reason) => {
                tracing::debug!("{} ({})", status, reason)
            }
            _ => {}
        }

        let mut response = (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response();
        let headers = response.headers_mut();
        match self {
            DavError::MethodNotAllowed => {
                headers.insert(header::ALLOW, super::hval(&ALLOWED_METHODS.join(", ")));
            }
            DavError::RangeNotSatisfiable { size } => {
                headers.insert(header::CONTENT_RANGE, super::hval(&format!("bytes */{}", size)));
            }
            _ => {}
        }
        response
    }
}

impl From<StorageError> for DavError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => DavError::NotFound,
            StorageError::PreconditionFailed(_) => DavError::PreconditionFailed,
            StorageError::InvalidRange { size } => DavError::RangeNotSatisfiable { size },
            other => DavError::Storage(other),
        }
    }
}

impl From<KeyValidationError> for DavError {
    fn from(err: KeyValidationError) -> Self {
        DavError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_classification() {
        let err: DavError = StorageError::NotFound("k".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let err: DavError = StorageError::PreconditionFailed("k".into()).into();
        assert_eq!(err.status_code(), StatusCode::PRECONDITION_FAILED);
        let err: DavError = StorageError::S3("boom".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let err: DavError = StorageError::DiskFull.into();
        assert_eq!(err.status_code(), StatusCode::INSUFFICIENT_STORAGE);
    }

    #[test]
    fn test_range_error_carries_size() {
        let response = DavError::RangeNotSatisfiable { size: 100 }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */100"
        );
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let response = DavError::MethodNotAllowed.into_response();
        let allow = response.headers().get(header::ALLOW).unwrap().to_str().unwrap();
        assert!(allow.contains("PROPFIND"));
    }
}
