//! Request handlers, one module per operation family.

use axum::http::HeaderMap;

use crate::errors::GatewayError;
use crate::identity::{self, IdentityVerifier};
use crate::AppState;

pub mod object;
pub mod prefix;
pub mod share;

/// Verify the request's bearer credential and return the subject ID.
///
/// Missing or rejected credentials are 401; a provider outage surfaces as
/// an upstream error via `?`.
pub(crate) async fn require_subject(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<String, GatewayError> {
    let token = identity::bearer_token(headers).ok_or_else(|| GatewayError::Unauthenticated {
        message: "Missing bearer credential".to_string(),
    })?;
    match state.identity.verify(token).await? {
        Some(subject) => Ok(subject),
        None => Err(GatewayError::Unauthenticated {
            message: "Invalid bearer credential".to_string(),
        }),
    }
}
