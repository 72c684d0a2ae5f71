//! GET and HEAD: file downloads with range/conditional support and HTML
//! directory indexes

use super::AppState;
use crate::api::errors::DavError;
use crate::api::extractors::DavPath;
use crate::api::hval;
use crate::api::xml::escape_xml;
use crate::dav::hierarchy::child_prefix;
use crate::dav::{href, is_placeholder, list_entries, ListMode};
use crate::storage::{GetOptions, GetOutcome, ObjectBody};
use crate::types::{http_date, ByteRange, Conditional, ResourcePath};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// User-Agent markers of clients that only understand percent-encoded
/// `filename="..."` and choke on RFC 5987 `filename*`.
const LEGACY_DISPOSITION_AGENTS: &[&str] = &["MSIE", "Trident/", "Microsoft-WebDAV-MiniRedir"];

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_get(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    headers: HeaderMap,
) -> Result<Response, DavError> {
    if is_placeholder(&path) {
        return Ok(placeholder_response());
    }
    if path.trailing_slash || path.is_root() {
        return directory_index(&state, &path).await;
    }
    file_download(&state, &path, &headers).await
}

/// HEAD: the GET response with its body dropped.
pub async fn handle_head(
    state: State<Arc<AppState>>,
    path: DavPath,
    headers: HeaderMap,
) -> Response {
    let response = handle_get(state, path, headers).await.into_response();
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Body::empty())
}

/// Empty body for OS-generated placeholder paths.
fn placeholder_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONTENT_LENGTH, "0"),
            (header::ACCEPT_RANGES, "bytes"),
        ],
    )
        .into_response()
}

async fn directory_index(state: &AppState, path: &ResourcePath) -> Result<Response, DavError> {
    if !path.is_root() {
        let exists = state
            .store
            .head(&path.key)
            .await?
            .map_or(false, |obj| obj.is_collection());
        if !exists {
            return Err(DavError::NotFound);
        }
    }

    let prefix = child_prefix(&path.key);
    let mut links = String::new();
    if !path.is_root() {
        links.push_str("<a href=\"../\">..</a><br>");
    }

    let mut entries = list_entries(state.store.clone(), prefix.clone(), ListMode::Shallow);
    while let Some(obj) = entries.try_next().await? {
        if obj.key == path.key {
            continue;
        }
        let label = obj
            .transport
            .content_disposition
            .clone()
            .unwrap_or_else(|| obj.key[prefix.len()..].to_string());
        links.push_str(&format!(
            "<a href=\"{}\">{}</a><br>",
            escape_xml(&href(&obj.key, obj.is_collection())),
            escape_xml(&label)
        ));
    }

    let page = format!(
        concat!(
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">",
            "<meta name=\"viewport\" content=\"width=device-width,initial-scale=1.0\">",
            "<title>Index of {title}</title><style>*{{box-sizing:border-box;}}",
            "body{{padding:10px;font-family:sans-serif;}}",
            "a{{display:inline-block;width:100%;color:#000;text-decoration:none;padding:5px 10px;border-radius:5px;}}",
            "a:hover{{background-color:#60C590;color:white;}}a[href=\"../\"]{{background-color:#cbd5e1;}}",
            "</style></head><body><h1>Index of {title}</h1><div>{links}</div></body></html>"
        ),
        title = escape_xml(&path.to_string()),
        links = links
    );
    // HEAD drops the body, so the length has to be stated up front
    let length = page.len().to_string();
    Ok(([(header::CONTENT_LENGTH, hval(&length))], Html(page)).into_response())
}

async fn file_download(
    state: &AppState,
    path: &ResourcePath,
    headers: &HeaderMap,
) -> Result<Response, DavError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse);
    let opts = GetOptions {
        range,
        conditional: Conditional::from_headers(headers),
    };

    let found = match state.store.get(&path.key, opts).await? {
        GetOutcome::NotFound => return Err(DavError::NotFound),
        GetOutcome::PreconditionFailed(_) => return Err(DavError::PreconditionFailed),
        GetOutcome::Found(found) => found,
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Ok(object_response(found, user_agent))
}

fn object_response(found: ObjectBody, user_agent: &str) -> Response {
    let ObjectBody {
        object,
        range,
        body,
    } = found;

    let content_length = match range {
        Some((start, end)) => end - start + 1,
        None => object.size,
    };
    let status = if range.is_some() && content_length != object.size {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    debug!(
        "Serving {} ({} of {} bytes, status {})",
        object.key, content_length, object.size, status
    );

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    let out = response.headers_mut();

    let transport = &object.transport;
    out.insert(
        header::CONTENT_TYPE,
        hval(
            transport
                .content_type
                .as_deref()
                .unwrap_or("application/octet-stream"),
        ),
    );
    out.insert(header::CONTENT_LENGTH, hval(&content_length.to_string()));
    if let Some((start, end)) = range {
        out.insert(
            header::CONTENT_RANGE,
            hval(&format!("bytes {}-{}/{}", start, end, object.size)),
        );
    }
    let disposition = match &transport.content_disposition {
        Some(stored) => stored.clone(),
        None => content_disposition(object.basename(), user_agent),
    };
    out.insert(header::CONTENT_DISPOSITION, hval(&disposition));
    out.insert(header::ACCEPT_RANGES, hval("bytes"));
    out.insert(header::ETAG, hval(&object.http_etag()));
    out.insert(header::LAST_MODIFIED, hval(&http_date(&object.uploaded)));
    if let Some(v) = &transport.content_encoding {
        out.insert(header::CONTENT_ENCODING, hval(v));
    }
    if let Some(v) = &transport.content_language {
        out.insert(header::CONTENT_LANGUAGE, hval(v));
    }
    if let Some(v) = &transport.cache_control {
        out.insert(header::CACHE_CONTROL, hval(v));
    }
    response
}

/// `inline` disposition for a filename. Non-ASCII names are percent-encoded
/// for legacy Microsoft clients and sent as an ASCII fallback plus
/// `filename*` to everyone else.
fn content_disposition(filename: &str, user_agent: &str) -> String {
    let plain = filename
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\');
    if plain {
        return format!("inline; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    if LEGACY_DISPOSITION_AGENTS
        .iter()
        .any(|marker| user_agent.contains(marker))
    {
        return format!("inline; filename=\"{}\"", encoded);
    }

    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
