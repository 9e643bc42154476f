//! Prometheus metrics for the gateway.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a Tower-compatible middleware for
//! HTTP RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::Request;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "fotogate_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "fotogate_http_request_duration_seconds";

/// Requests rejected by the rate limiter (counter). Labels: scope.
pub const RATE_LIMITED_TOTAL: &str = "fotogate_rate_limited_total";

/// Uploads rejected because the quota ceiling was hit (counter).
pub const QUOTA_REJECTED_TOTAL: &str = "fotogate_quota_rejected_total";

/// Share tokens issued (counter).
pub const SHARE_TOKENS_ISSUED_TOTAL: &str = "fotogate_share_tokens_issued_total";

/// Share-token validations (counter). Labels: outcome.
pub const SHARE_TOKEN_VALIDATIONS_TOTAL: &str = "fotogate_share_token_validations_total";

/// Bytes accepted in upload bodies (counter).
pub const BYTES_UPLOADED_TOTAL: &str = "fotogate_bytes_uploaded_total";

/// Keys removed by single and bulk deletes (counter).
pub const KEYS_DELETED_TOTAL: &str = "fotogate_keys_deleted_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by the rate limiter");
    describe_counter!(QUOTA_REJECTED_TOTAL, "Uploads rejected by the quota engine");
    describe_counter!(SHARE_TOKENS_ISSUED_TOTAL, "Share tokens issued");
    describe_counter!(
        SHARE_TOKEN_VALIDATIONS_TOTAL,
        "Share-token validations by outcome"
    );
    describe_counter!(BYTES_UPLOADED_TOTAL, "Bytes accepted in upload bodies");
    describe_counter!(KEYS_DELETED_TOTAL, "Keys removed by deletes");
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation to avoid feedback loops.
/// Must be the outermost layer so it captures the full request lifecycle.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let route = route_class(req.uri().path(), req.uri().query());

    // Do not instrument the metrics endpoint itself.
    if route == "metrics" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route,
        "status" => status
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method,
        "route" => route
    )
    .record(elapsed);

    response
}

// Route cardinality must stay bounded: object keys and prefixes collapse
// into a handful of classes.
fn route_class(path: &str, query: Option<&str>) -> &'static str {
    match path {
        "/metrics" => "metrics",
        "/health" => "health",
        "/share-token" => "share_token",
        "/" => {
            if query.is_some_and(|q| q.contains("prefix=")) {
                "prefix"
            } else {
                "root"
            }
        }
        _ => "object",
    }
}

/// `GET /metrics` -- Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = init_metrics();
    (
        [("content-type", "text/plain; version=0.0.4")],
        handle.render(),
    )
}
