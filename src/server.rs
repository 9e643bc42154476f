//! Axum router construction and request dispatch.
//!
//! The [`app`] function wires every gateway endpoint to its handler and
//! returns a ready-to-serve [`axum::Router`].
//!
//! Routing follows the storage namespace: `/{path}` addresses a single
//! object, `/` with a `prefix` query parameter addresses a key range, and
//! `/share-token` mints gallery share tokens. Query parameters are parsed
//! once per request into a map and threaded through the handlers.

use axum::{
    extract::{ConnectInfo, Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics::counter;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::{generate_request_id, GatewayError};
use crate::metrics::{metrics_handler, metrics_middleware, RATE_LIMITED_TOTAL};
use crate::ratelimit::{RateDecision, Scope};
use crate::AppState;

/// Build the axum [`Router`] with all gateway routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint.
        .route("/health", get(health_check))
        // Prometheus metrics endpoint.
        .route("/metrics", get(metrics_handler))
        // Share-token issuance.
        .route(
            "/share-token",
            post(handle_issue_share_token).options(preflight),
        )
        // Prefix-level: GET /?prefix= lists, DELETE /?prefix= bulk-deletes.
        .route(
            "/",
            get(handle_list_prefix)
                .delete(handle_bulk_delete)
                .options(preflight),
        )
        // Object-level routes (wildcard captures slashes).
        .route(
            "/*path",
            get(handle_get_object)
                .put(handle_put_object)
                .delete(handle_delete_object)
                .options(preflight),
        )
        // Application state shared across all handlers.
        .with_state(state.clone())
        // Layer ordering: inner layers run first, outer layers wrap them.
        // The rate limiter is innermost so CORS and headers still apply to
        // limited responses.
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
        .layer(middleware::from_fn(common_headers_middleware))
        // Browser galleries fetch images cross-origin.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Common headers middleware -----------------------------------------------

/// Adds the standard response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `FotoGate`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // The error responder sets its own x-request-id.
    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("FotoGate"));

    response
}

// -- Rate limiting middleware -------------------------------------------------

/// Paths that bypass rate limiting.
const RATE_LIMIT_SKIP_PATHS: &[&str] = &["/health", "/metrics"];

/// Per-client fixed-window rate limiting.
///
/// Reads (GET, HEAD) and writes (everything else) count against separate
/// ceilings. Preflight requests and infrastructure endpoints are exempt.
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let path = req.uri().path();
    if RATE_LIMIT_SKIP_PATHS.contains(&path) || req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let scope = if req.method() == Method::GET || req.method() == Method::HEAD {
        Scope::Read
    } else {
        Scope::Write
    };
    let client_key = client_key(&req, state.config.rate_limit.trust_forwarded_for);

    match state.limiter.check(scope, &client_key) {
        RateDecision::Allowed => Ok(next.run(req).await),
        RateDecision::Limited {
            retry_after_seconds,
        } => {
            let scope_label = match scope {
                Scope::Read => "read",
                Scope::Write => "write",
            };
            counter!(RATE_LIMITED_TOTAL, "scope" => scope_label).increment(1);
            Err(GatewayError::RateLimited {
                retry_after_seconds,
            })
        }
    }
}

/// Best-effort client key: first hop of `x-forwarded-for` when a trusted
/// proxy fronts the gateway, otherwise the peer socket address. The header
/// is client-controlled, so it only counts when configuration says the
/// deployment strips and re-adds it.
fn client_key(req: &Request<axum::body::Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `OPTIONS` on any API route -- the CORS layer fills in the
/// access-control headers.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

// -- Query parameter parsing helper ------------------------------------------

/// Parse a raw query string into a HashMap.
fn parse_query(raw: Option<String>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(qs) = raw {
        for part in qs.split('&') {
            if let Some((k, v)) = part.split_once('=') {
                let decoded_k = percent_encoding::percent_decode_str(k)
                    .decode_utf8_lossy()
                    .into_owned();
                let decoded_v = percent_encoding::percent_decode_str(v)
                    .decode_utf8_lossy()
                    .into_owned();
                map.insert(decoded_k, decoded_v);
            } else if !part.is_empty() {
                let decoded = percent_encoding::percent_decode_str(part)
                    .decode_utf8_lossy()
                    .into_owned();
                map.insert(decoded, String::new());
            }
        }
    }
    map
}

// -- Route handlers ----------------------------------------------------------

/// `GET /?prefix=...` -- prefix listing.
async fn handle_list_prefix(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, GatewayError> {
    let query = parse_query(raw_query);
    crate::handlers::prefix::list_prefix(state, &query).await
}

/// `DELETE /?prefix=...` -- bulk delete.
async fn handle_bulk_delete(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let query = parse_query(raw_query);
    crate::handlers::prefix::bulk_delete(state, &headers, &query).await
}

/// `POST /share-token?galleryId=...` -- share-token issuance.
async fn handle_issue_share_token(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let query = parse_query(raw_query);
    crate::handlers::share::issue_share_token(state, &headers, &query).await
}

/// `GET /*path` -- object fetch.
async fn handle_get_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, GatewayError> {
    let query = parse_query(raw_query);
    crate::handlers::object::get_object(state, &path, &query).await
}

/// `PUT /*path` -- object upload.
async fn handle_put_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Response, GatewayError> {
    crate::handlers::object::put_object(state, &path, &headers, body).await
}

/// `DELETE /*path` -- object delete.
async fn handle_delete_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    crate::handlers::object::delete_object(state, &path, &headers).await
}
