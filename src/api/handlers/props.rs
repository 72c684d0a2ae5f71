//! PROPFIND and PROPPATCH

use super::{multistatus_response, AppState};
use crate::api::errors::DavError;
use crate::api::extractors::{DavPath, Depth, DepthHeader};
use crate::api::xml::{parse_property_update, Multistatus};
use crate::dav::hierarchy::child_prefix;
use crate::dav::transfer::replace_custom_metadata;
use crate::dav::{href, is_placeholder, list_entries, DavProperties, ListMode, Resource};
use crate::types::RESOURCETYPE_KEY;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_propfind(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    depth: DepthHeader,
) -> Result<Response, DavError> {
    let Some(depth) = depth.depth() else {
        return Err(DavError::Forbidden("Invalid Depth header".to_string()));
    };
    let now = Utc::now();
    let mut ms = Multistatus::new();

    if is_placeholder(&path) {
        ms.push_properties(
            &path.key,
            &DavProperties::derive(Resource::Placeholder(&path.key), now),
        );
        return Ok(multistatus_response(ms.finish()));
    }

    let collection = if path.is_root() {
        ms.push_properties("", &DavProperties::derive(Resource::Root, now));
        true
    } else {
        let Some(obj) = state.store.head(&path.key).await? else {
            return Err(DavError::NotFound);
        };
        ms.push_properties(&obj.key, &DavProperties::derive(Resource::Object(&obj), now));
        obj.is_collection()
    };

    let mode = match depth {
        Depth::Zero => None,
        Depth::One => Some(ListMode::Shallow),
        Depth::Infinity => Some(ListMode::Recursive),
    };
    if let (true, Some(mode)) = (collection, mode) {
        let mut entries = list_entries(state.store.clone(), child_prefix(&path.key), mode);
        let mut count = 0usize;
        while let Some(obj) = entries.try_next().await? {
            ms.push_properties(&obj.key, &DavProperties::derive(Resource::Object(&obj), now));
            count += 1;
        }
        debug!("PROPFIND {} listed {} members", path, count);
    }

    Ok(multistatus_response(ms.finish()))
}

#[instrument(skip_all, fields(key = %path.key))]
pub async fn handle_proppatch(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    body: Bytes,
) -> Result<Response, DavError> {
    let update = parse_property_update(&body).map_err(|e| {
        debug!("Rejecting PROPPATCH body: {}", e);
        DavError::MalformedXml
    })?;

    if path.is_root() {
        return Err(DavError::Forbidden(
            "The root collection has no writable properties".to_string(),
        ));
    }

    let target_href = if is_placeholder(&path) {
        href(&path.key, false)
    } else {
        let Some(obj) = state.store.head(&path.key).await? else {
            return Err(DavError::NotFound);
        };
        let mut custom = obj.custom.clone();
        // The collection marker is acknowledged but never patched
        for (name, value) in update.set.iter().filter(|(n, _)| n != RESOURCETYPE_KEY) {
            custom.insert(name.clone(), value.clone());
        }
        // Removes apply last, so a property both set and removed ends up absent
        for name in update.remove.iter().filter(|n| *n != RESOURCETYPE_KEY) {
            custom.remove(name);
        }
        let updated = replace_custom_metadata(state.store.as_ref(), &path.key, custom).await?;
        href(&updated.key, updated.is_collection())
    };

    let mut ms = Multistatus::new();
    for (name, _) in &update.set {
        ms.push_property_status(&target_href, name);
    }
    for name in &update.remove {
        ms.push_property_status(&target_href, name);
    }
    Ok(multistatus_response(ms.finish()))
}
