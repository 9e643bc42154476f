//! Prefix operations: listing and bulk delete.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, StreamExt, TryStreamExt};
use metrics::counter;
use serde::Serialize;
use tracing::info;

use crate::blobstore::backend::{list_all, BlobStore};
use crate::errors::GatewayError;
use crate::metrics::KEYS_DELETED_TOTAL;
use crate::paths::classify_prefix;
use crate::{policy, AppState};

/// Deletes issued concurrently within one batch.
const DELETE_BATCH_SIZE: usize = 25;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListedItem {
    key: String,
    size: u64,
    last_modified: String,
}

#[derive(Debug, Serialize)]
struct BulkDeleteResponse {
    deleted: usize,
}

fn require_prefix(query: &HashMap<String, String>) -> Result<&str, GatewayError> {
    match query.get("prefix").map(String::as_str) {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(GatewayError::InvalidArgument {
            message: "Missing required query parameter: prefix".to_string(),
        }),
    }
}

/// `GET /?prefix=...` -- list the keys under a readable prefix.
///
/// Only gallery variant prefixes are listable; management and branding
/// prefixes never enumerate.
pub async fn list_prefix(
    state: Arc<AppState>,
    query: &HashMap<String, String>,
) -> Result<Response, GatewayError> {
    let raw_prefix = require_prefix(query)?;
    let loc = classify_prefix(raw_prefix).ok_or_else(|| GatewayError::InvalidPath {
        path: raw_prefix.to_string(),
    })?;

    if !policy::can_public_list(&loc) {
        return Err(GatewayError::Forbidden {
            message: "This prefix is not listable".to_string(),
        });
    }
    super::object::enforce_share_gate(&state, &loc, query).await?;

    let key_prefix = loc.prefix_key().ok_or_else(|| GatewayError::InvalidPath {
        path: raw_prefix.to_string(),
    })?;
    let metas = list_all(state.blobs.as_ref(), &key_prefix).await?;
    let items: Vec<ListedItem> = metas
        .into_iter()
        .map(|m| ListedItem {
            key: m.key,
            size: m.size,
            last_modified: m.last_modified.to_rfc3339(),
        })
        .collect();

    Ok((StatusCode::OK, Json(items)).into_response())
}

/// `DELETE /?prefix=...` -- delete every key under an owned prefix.
///
/// Enumerates the prefix, then deletes in batches of [`DELETE_BATCH_SIZE`]
/// concurrent requests. Partial failure aborts with an upstream error;
/// already-deleted keys do not fail the batch, so a retry converges.
pub async fn bulk_delete(
    state: Arc<AppState>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<Response, GatewayError> {
    let raw_prefix = require_prefix(query)?;
    let loc = classify_prefix(raw_prefix).ok_or_else(|| GatewayError::InvalidPath {
        path: raw_prefix.to_string(),
    })?;

    // Variant prefixes are a read surface; bulk delete takes the
    // management or branding form only.
    if policy::can_public_list(&loc) {
        return Err(GatewayError::Forbidden {
            message: "This prefix is not deletable".to_string(),
        });
    }

    let subject = super::require_subject(&state, headers).await?;
    state
        .ownership
        .authorize_write(state.docs.as_ref(), &loc, &subject)
        .await?;

    let key_prefix = loc.prefix_key().ok_or_else(|| GatewayError::InvalidPath {
        path: raw_prefix.to_string(),
    })?;
    let metas = list_all(state.blobs.as_ref(), &key_prefix).await?;
    let total = metas.len();

    let blobs: &dyn BlobStore = state.blobs.as_ref();
    for batch in metas.chunks(DELETE_BATCH_SIZE) {
        let deletes: Vec<_> = batch.iter().map(|m| blobs.delete(&m.key)).collect();
        stream::iter(deletes)
            .buffer_unordered(DELETE_BATCH_SIZE)
            .try_collect::<Vec<_>>()
            .await?;
    }

    state.quota.invalidate(&subject);
    if let Some(gallery_id) = loc.gallery_id() {
        state.ownership.invalidate(gallery_id);
    }
    counter!(KEYS_DELETED_TOTAL).increment(total as u64);
    info!("bulk delete removed {total} keys under {key_prefix} for {subject}");

    Ok((StatusCode::OK, Json(BulkDeleteResponse { deleted: total })).into_response())
}
