//! Gateway error taxonomy.
//!
//! Every variant maps to a single HTTP status code.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(GatewayError::Forbidden { .. })` and get a JSON error body.
//!
//! All authorization failures must be produced *before* any blob store
//! mutation; handlers rely on that ordering.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Gateway error codes expressed as a Rust enum.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed, traversal, or out-of-namespace object path.
    #[error("The request path is not a valid storage location")]
    InvalidPath { path: String },

    /// A request argument (query parameter, header) is invalid or missing.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Missing or unverifiable bearer credential.
    #[error("{message}")]
    Unauthenticated { message: String },

    /// Valid identity but not the resource owner, failed share-token gate,
    /// or quota exceeded.
    #[error("{message}")]
    Forbidden { message: String },

    /// The object, gallery record, or user record does not exist.
    #[error("The requested resource does not exist")]
    NotFound { resource: String },

    /// Upload body exceeds the configured ceiling.
    #[error("The upload exceeds the maximum allowed size of {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: u64 },

    /// Content type is not in the image allow-list.
    #[error("Content type {content_type:?} is not an accepted image type")]
    UnsupportedMediaType { content_type: String },

    /// Too many requests from this client in the current window.
    #[error("Too many requests, retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    /// An external provider (identity, document store, blob store) failed.
    #[error("An upstream provider failed, please retry the request")]
    Upstream(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable machine-readable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidPath { .. } => "InvalidPath",
            GatewayError::InvalidArgument { .. } => "InvalidArgument",
            GatewayError::Unauthenticated { .. } => "Unauthenticated",
            GatewayError::Forbidden { .. } => "Forbidden",
            GatewayError::NotFound { .. } => "NotFound",
            GatewayError::PayloadTooLarge { .. } => "PayloadTooLarge",
            GatewayError::UnsupportedMediaType { .. } => "UnsupportedMediaType",
            GatewayError::RateLimited { .. } => "RateLimited",
            GatewayError::Upstream(_) => "Upstream",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            GatewayError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());

        if let GatewayError::Upstream(ref err) = self {
            tracing::error!("upstream failure: {err:#}");
        }

        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        })
        .to_string();

        let mut response =
            (status, [("content-type", "application/json")], body).into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&date) {
            headers.insert("date", value);
        }
        headers.insert("server", HeaderValue::from_static("FotoGate"));

        if let GatewayError::RateLimited {
            retry_after_seconds,
        } = self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                headers.insert("retry-after", value);
            }
        }

        response
    }
}
