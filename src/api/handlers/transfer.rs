//! COPY and MOVE

use super::AppState;
use crate::api::errors::DavError;
use crate::api::extractors::{DavPath, Depth, DepthHeader, Destination, Overwrite};
use crate::dav::hierarchy::{child_prefix, is_within, parent_exists, rebase_key};
use crate::dav::transfer::{copy_all, delete_prefix};
use crate::dav::{collect_entries, ListMode};
use crate::types::{ResourcePath, StoredObject};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferKind {
    Copy,
    Move,
}

/// Outcome of the checks shared by COPY and MOVE.
struct Plan {
    source: StoredObject,
    dest_existed: Option<StoredObject>,
}

#[instrument(skip_all, fields(from = %path.key, to = %dest.key))]
pub async fn handle_copy(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    Destination(dest): Destination,
    Overwrite(overwrite): Overwrite,
    depth: DepthHeader,
) -> Result<Response, DavError> {
    let plan = check(&state, TransferKind::Copy, &path, &dest, overwrite).await?;
    let deep = match (plan.source.is_collection(), depth.depth()) {
        (false, _) => false,
        (true, Some(Depth::Infinity)) => true,
        (true, Some(Depth::Zero)) => false,
        (true, _) => return Err(DavError::BadRequest("Invalid Depth for COPY".to_string())),
    };

    let pairs = transfer_pairs(&state, &path.key, &dest.key, deep).await?;
    let count = pairs.len();
    copy_all(state.store.clone(), pairs, state.copy_concurrency).await?;
    info!("COPY {} -> {} ({} objects)", path, dest, count);

    Ok(created_or_replaced(plan.dest_existed.is_some()))
}

#[instrument(skip_all, fields(from = %path.key, to = %dest.key))]
pub async fn handle_move(
    State(state): State<Arc<AppState>>,
    DavPath(path): DavPath,
    Destination(dest): Destination,
    Overwrite(overwrite): Overwrite,
    depth: DepthHeader,
) -> Result<Response, DavError> {
    let plan = check(&state, TransferKind::Move, &path, &dest, overwrite).await?;
    let collection = plan.source.is_collection();
    if collection && depth.depth() != Some(Depth::Infinity) {
        return Err(DavError::BadRequest(
            "MOVE of a collection requires Depth: infinity".to_string(),
        ));
    }

    if let Some(existing) = &plan.dest_existed {
        state.store.delete(&dest.key).await?;
        if existing.is_collection() {
            delete_prefix(state.store.clone(), &child_prefix(&dest.key)).await?;
        }
    }

    let pairs = transfer_pairs(&state, &path.key, &dest.key, collection).await?;
    let sources: Vec<String> = pairs.iter().map(|(from, _)| from.clone()).collect();
    copy_all(state.store.clone(), pairs, state.copy_concurrency).await?;
    // Not atomic: an interruption here leaves both copies in place
    state.store.delete_many(&sources).await?;
    info!("MOVE {} -> {} ({} objects)", path, dest, sources.len());

    Ok(created_or_replaced(plan.dest_existed.is_some()))
}

async fn check(
    state: &AppState,
    kind: TransferKind,
    source: &ResourcePath,
    dest: &ResourcePath,
    overwrite: Option<bool>,
) -> Result<Plan, DavError> {
    if source.is_root() || dest.is_root() {
        return Err(DavError::Forbidden(
            "the root collection cannot be copied or replaced".to_string(),
        ));
    }
    if kind == TransferKind::Move && source.key == dest.key {
        return Err(DavError::BadRequest(
            "source and destination are the same".to_string(),
        ));
    }
    if !parent_exists(state.store.as_ref(), &dest.key).await? {
        return Err(DavError::Conflict(format!(
            "parent of destination {} does not exist",
            dest
        )));
    }

    let dest_existed = state.store.head(&dest.key).await?;
    if dest_existed.is_some() {
        let allowed = match kind {
            TransferKind::Copy => overwrite != Some(false),
            TransferKind::Move => overwrite == Some(true),
        };
        if !allowed {
            return Err(DavError::PreconditionFailed);
        }
    }

    let Some(source_obj) = state.store.head(&source.key).await? else {
        return Err(DavError::NotFound);
    };
    if is_within(&dest.key, &source.key) {
        return Err(DavError::Forbidden(format!(
            "destination {} lies inside {}",
            dest, source
        )));
    }

    Ok(Plan {
        source: source_obj,
        dest_existed,
    })
}

/// `(from, to)` key pairs: the object itself, plus every descendant when
/// `deep` is set.
async fn transfer_pairs(
    state: &AppState,
    from: &str,
    to: &str,
    deep: bool,
) -> Result<Vec<(String, String)>, DavError> {
    let mut pairs = vec![(from.to_string(), to.to_string())];
    if deep {
        let descendants =
            collect_entries(state.store.clone(), child_prefix(from), ListMode::Recursive).await?;
        pairs.extend(
            descendants
                .into_iter()
                .map(|obj| {
                    let target = rebase_key(&obj.key, from, to);
                    (obj.key, target)
                }),
        );
    }
    Ok(pairs)
}

fn created_or_replaced(existed: bool) -> Response {
    if existed {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}
