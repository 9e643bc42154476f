//! Share-token issuance.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::info;

use crate::docstore::store::{DocumentStore, ShareGrant};
use crate::errors::GatewayError;
use crate::metrics::SHARE_TOKENS_ISSUED_TOTAL;
use crate::share;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareTokenResponse {
    token: String,
    expires_at: String,
    ttl_hours: u64,
}

/// `POST /share-token?galleryId=...&ttlHours=...` -- mint a share token.
///
/// Rotates the gallery's share grant: the plaintext token is returned once
/// and only its hash is persisted, so any previously issued token stops
/// validating immediately.
pub async fn issue_share_token(
    state: Arc<AppState>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<Response, GatewayError> {
    let gallery_id = match query.get("galleryId").map(String::as_str) {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(GatewayError::InvalidArgument {
                message: "Missing required query parameter: galleryId".to_string(),
            })
        }
    };
    let ttl_hours = match query.get("ttlHours") {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            GatewayError::InvalidArgument {
                message: "ttlHours must be a positive integer".to_string(),
            }
        })?),
        None => None,
    };

    let subject = super::require_subject(&state, headers).await?;
    let record = state
        .docs
        .get_gallery(gallery_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound {
            resource: format!("gallery {gallery_id}"),
        })?;
    if record.owner_id != subject {
        return Err(GatewayError::Forbidden {
            message: "You do not own this resource".to_string(),
        });
    }

    let issued = share::issue(ttl_hours, Utc::now());
    state
        .docs
        .set_share_grant(
            gallery_id,
            ShareGrant {
                token_hash: issued.token_hash.clone(),
                expires_at: issued.expires_at,
            },
        )
        .await?;
    // The cached record still holds the old grant; drop it so the new
    // token validates on the next read.
    state.ownership.invalidate(gallery_id);

    counter!(SHARE_TOKENS_ISSUED_TOTAL).increment(1);
    info!("issued share token for gallery {gallery_id} (ttl {}h)", issued.ttl_hours);

    Ok((
        StatusCode::OK,
        Json(ShareTokenResponse {
            token: issued.token,
            expires_at: issued.expires_at.to_rfc3339(),
            ttl_hours: issued.ttl_hours,
        }),
    )
        .into_response())
}
