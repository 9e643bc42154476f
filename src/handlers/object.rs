//! Single-object GET / PUT / DELETE handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use metrics::counter;
use tracing::debug;

use crate::blobstore::backend::BlobStore;
use crate::errors::GatewayError;
use crate::metrics::{
    BYTES_UPLOADED_TOTAL, KEYS_DELETED_TOTAL, QUOTA_REJECTED_TOTAL,
    SHARE_TOKEN_VALIDATIONS_TOTAL,
};
use crate::paths::{classify_path, Location};
use crate::quota::QuotaDecision;
use crate::{policy, share, AppState};

/// Content types accepted for uploads.
const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/avif",
];

/// Query parameter carrying a share token.
pub(crate) const SHARE_TOKEN_PARAM: &str = "st";

/// Classify an object path or reject the request.
fn classify_object(raw_path: &str) -> Result<(Location, String), GatewayError> {
    let loc = classify_path(raw_path).ok_or_else(|| GatewayError::InvalidPath {
        path: raw_path.to_string(),
    })?;
    // classify_path only produces object locations, so a key always exists.
    let key = loc.object_key().ok_or_else(|| GatewayError::InvalidPath {
        path: raw_path.to_string(),
    })?;
    Ok((loc, key))
}

/// Enforce the share-token gate for a gallery location.
///
/// Fetches the gallery's access record (missing gallery: 404) and, when the
/// record demands it, validates the `st` token. Expired, missing and wrong
/// tokens all map to the same 403.
pub(crate) async fn enforce_share_gate(
    state: &AppState,
    loc: &Location,
    query: &HashMap<String, String>,
) -> Result<(), GatewayError> {
    if !policy::share_gated(loc) {
        return Ok(());
    }
    let gallery_id = match loc.gallery_id() {
        Some(id) => id,
        None => return Ok(()),
    };

    let record = state
        .ownership
        .gallery_record(state.docs.as_ref(), gallery_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound {
            resource: format!("gallery {gallery_id}"),
        })?;

    if !record.public_share_required {
        return Ok(());
    }

    let presented = query.get(SHARE_TOKEN_PARAM).map(String::as_str);
    if share::validate(&record, presented, Utc::now()) {
        counter!(SHARE_TOKEN_VALIDATIONS_TOTAL, "outcome" => "allowed").increment(1);
        Ok(())
    } else {
        counter!(SHARE_TOKEN_VALIDATIONS_TOTAL, "outcome" => "denied").increment(1);
        Err(GatewayError::Forbidden {
            message: "A valid share token is required".to_string(),
        })
    }
}

/// `GET /{path}` -- serve object bytes with the stored content type.
pub async fn get_object(
    state: Arc<AppState>,
    raw_path: &str,
    query: &HashMap<String, String>,
) -> Result<Response, GatewayError> {
    let (loc, key) = classify_object(raw_path)?;

    if !policy::can_public_read(&loc) {
        return Err(GatewayError::Forbidden {
            message: "This location is not readable".to_string(),
        });
    }
    enforce_share_gate(&state, &loc, query).await?;

    match state.blobs.get(&key).await? {
        Some(blob) => Ok((
            StatusCode::OK,
            [("content-type", blob.content_type)],
            blob.data,
        )
            .into_response()),
        None => Err(GatewayError::NotFound { resource: key }),
    }
}

/// `PUT /{path}` -- authenticated upload with ownership and quota checks.
///
/// The body is never buffered past the configured upload ceiling: a
/// `Content-Length` over the limit fails before any bytes are read, and
/// collection itself is bounded for chunked bodies. Every rejection
/// happens before the blob write; the quota cache is only bumped after
/// the write succeeds.
pub async fn put_object(
    state: Arc<AppState>,
    raw_path: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, GatewayError> {
    let (loc, key) = classify_object(raw_path)?;

    let limit = state.config.server.max_upload_bytes;
    if let Some(declared) = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if declared > limit {
            return Err(GatewayError::PayloadTooLarge { limit_bytes: limit });
        }
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .unwrap_or_default();
    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(GatewayError::UnsupportedMediaType { content_type });
    }

    let subject = super::require_subject(&state, headers).await?;
    state
        .ownership
        .authorize_write(state.docs.as_ref(), &loc, &subject)
        .await?;

    let body = to_bytes(body, limit as usize)
        .await
        .map_err(|_| GatewayError::PayloadTooLarge { limit_bytes: limit })?;

    // Quota applies to gallery uploads only, never branding assets.
    let counted = loc.gallery_id().is_some();
    if counted {
        let decision = state
            .quota
            .check(
                state.docs.as_ref(),
                state.blobs.as_ref(),
                &subject,
                body.len() as u64,
            )
            .await?;
        if let QuotaDecision::Exceeded {
            used_bytes,
            limit_bytes,
        } = decision
        {
            debug!("quota exceeded for {subject}: used={used_bytes} limit={limit_bytes}");
            counter!(QUOTA_REJECTED_TOTAL).increment(1);
            return Err(GatewayError::Forbidden {
                message: "Quota exceeded".to_string(),
            });
        }
    }

    let size = body.len() as u64;
    state.blobs.put(&key, &content_type, body).await?;

    if counted {
        state.quota.commit(&subject, size);
    }
    counter!(BYTES_UPLOADED_TOTAL).increment(size);
    debug!("put {key} ({size} bytes) by {subject}");

    Ok((StatusCode::OK, "OK").into_response())
}

/// `DELETE /{path}` -- authenticated single-object delete.
///
/// Idempotent: deleting a missing key still succeeds. The subject's quota
/// cache is dropped so the next upload recomputes usage.
pub async fn delete_object(
    state: Arc<AppState>,
    raw_path: &str,
    headers: &HeaderMap,
) -> Result<Response, GatewayError> {
    let (loc, key) = classify_object(raw_path)?;

    let subject = super::require_subject(&state, headers).await?;
    state
        .ownership
        .authorize_write(state.docs.as_ref(), &loc, &subject)
        .await?;

    state.blobs.delete(&key).await?;
    state.quota.invalidate(&subject);
    counter!(KEYS_DELETED_TOTAL).increment(1);
    debug!("delete {key} by {subject}");

    Ok((StatusCode::OK, "OK").into_response())
}
