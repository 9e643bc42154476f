//! End-to-end gateway tests against the in-memory backends.
//!
//! Each test builds a fresh router with `tower::ServiceExt::oneshot`, a
//! static identity verifier and seeded memory stores, then drives it with
//! plain HTTP requests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use chrono::{Duration, Utc};
use tower::ServiceExt;

use fotogate::blobstore::backend::BlobStore;
use fotogate::blobstore::memory::MemoryBlobStore;
use fotogate::config::Config;
use fotogate::docstore::memory::MemoryDocumentStore;
use fotogate::docstore::store::{GalleryRecord, UserRecord};
use fotogate::identity::StaticIdentityVerifier;
use fotogate::{server, share, AppState};

struct TestGateway {
    app: axum::Router,
    docs: Arc<MemoryDocumentStore>,
    blobs: Arc<MemoryBlobStore>,
}

fn gateway_with_config(config: Config) -> TestGateway {
    let docs = Arc::new(MemoryDocumentStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let identity = StaticIdentityVerifier::new(HashMap::from([
        ("tok-u1".to_string(), "u1".to_string()),
        ("tok-u2".to_string(), "u2".to_string()),
    ]));

    let state = Arc::new(AppState::new(
        config,
        docs.clone(),
        blobs.clone(),
        Arc::new(identity),
    ));
    TestGateway {
        app: server::app(state),
        docs,
        blobs,
    }
}

fn gateway() -> TestGateway {
    gateway_with_config(Config::default())
}

fn open_gallery(id: &str, owner: &str) -> GalleryRecord {
    GalleryRecord {
        gallery_id: id.into(),
        owner_id: owner.into(),
        public_share_required: false,
        public_share_token_hash: String::new(),
        public_share_expires_at: None,
    }
}

fn gated_gallery(id: &str, owner: &str, token: &str) -> GalleryRecord {
    GalleryRecord {
        gallery_id: id.into(),
        owner_id: owner.into(),
        public_share_required: true,
        public_share_token_hash: share::hash_token(token),
        public_share_expires_at: Some(Utc::now() + Duration::hours(24)),
    }
}

async fn seed_object(blobs: &MemoryBlobStore, key: &str, size: usize) {
    blobs
        .put(key, "image/jpeg", Bytes::from(vec![0u8; size]))
        .await
        .unwrap();
}

async fn send(gw: &TestGateway, req: Request<Body>) -> (StatusCode, Bytes) {
    let response = gw.app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn put_image(uri: &str, token: &str, size: usize) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "image/jpeg")
        .body(Body::from(vec![0u8; size]))
        .unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

// -- Reads --------------------------------------------------------------------

#[tokio::test]
async fn anonymous_get_serves_public_object() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 42).await;

    let response = gw
        .app
        .clone()
        .oneshot(get("/galleries/g1/originals/a.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(response.headers().get("server").unwrap(), "FotoGate");
    assert!(response.headers().contains_key("x-request-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 42);
}

#[tokio::test]
async fn get_missing_object_is_404() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    let (status, _) = send(&gw, get("/galleries/g1/originals/missing.jpg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_with_unknown_gallery_is_404() {
    let gw = gateway();
    let (status, _) = send(&gw, get("/galleries/ghost/originals/a.jpg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_paths_are_400() {
    let gw = gateway();
    for uri in [
        "/galleries/g1/weird/a.jpg",
        "/galleries/../secrets",
        "/somewhere/else.txt",
    ] {
        let (status, _) = send(&gw, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn share_gate_blocks_until_token_presented() {
    let gw = gateway();
    gw.docs.insert_gallery(gated_gallery("g1", "u1", "sekrit"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 1).await;

    let (status, _) = send(&gw, get("/galleries/g1/originals/a.jpg")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&gw, get("/galleries/g1/originals/a.jpg?st=wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&gw, get("/galleries/g1/originals/a.jpg?st=sekrit")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_share_token_is_rejected() {
    let gw = gateway();
    let mut record = gated_gallery("g1", "u1", "sekrit");
    record.public_share_expires_at = Some(Utc::now() - Duration::hours(1));
    gw.docs.insert_gallery(record);
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 1).await;

    let (status, _) = send(&gw, get("/galleries/g1/originals/a.jpg?st=sekrit")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// -- Listing ------------------------------------------------------------------

#[tokio::test]
async fn list_variant_prefix_returns_items() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 10).await;
    seed_object(&gw.blobs, "galleries/g1/originals/b.jpg", 20).await;
    seed_object(&gw.blobs, "galleries/g1/thumbnails/a.jpg", 1).await;

    let (status, body) = send(&gw, get("/?prefix=galleries/g1/originals/")).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["key"], "galleries/g1/originals/a.jpg");
    assert_eq!(items[0]["size"], 10);
    assert!(items[0]["lastModified"].is_string());
}

#[tokio::test]
async fn list_management_and_branding_prefixes_forbidden() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    let (status, _) = send(&gw, get("/?prefix=galleries/g1/")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&gw, get("/?prefix=branding/u1/")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_without_prefix_is_400() {
    let gw = gateway();
    let (status, _) = send(&gw, get("/")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_gated_gallery_requires_token() {
    let gw = gateway();
    gw.docs.insert_gallery(gated_gallery("g1", "u1", "sekrit"));
    seed_object(&gw.blobs, "galleries/g1/medium/a.jpg", 5).await;

    let (status, _) = send(&gw, get("/?prefix=galleries/g1/medium/")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&gw, get("/?prefix=galleries/g1/medium/&st=sekrit")).await;
    assert_eq!(status, StatusCode::OK);
}

// -- Uploads ------------------------------------------------------------------

#[tokio::test]
async fn put_requires_authentication() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    let req = Request::builder()
        .method("PUT")
        .uri("/galleries/g1/originals/a.jpg")
        .header("content-type", "image/jpeg")
        .body(Body::from(vec![0u8; 8]))
        .unwrap();
    let (status, _) = send(&gw, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &gw,
        put_image("/galleries/g1/originals/a.jpg", "bogus", 8),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn put_by_owner_stores_object() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    let (status, _) = send(
        &gw,
        put_image("/galleries/g1/originals/a.jpg", "tok-u1", 16),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.data.len(), 16);
    assert_eq!(stored.content_type, "image/jpeg");
}

#[tokio::test]
async fn put_by_non_owner_is_403_and_writes_nothing() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    let (status, _) = send(
        &gw,
        put_image("/galleries/g1/originals/a.jpg", "tok-u2", 16),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn put_branding_asset_owned_by_path_segment() {
    let gw = gateway();

    let (status, _) = send(&gw, put_image("/branding/u1/logo.png", "tok-u1", 16)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&gw, put_image("/branding/u1/logo.png", "tok-u2", 16)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn put_rejects_non_image_content_type() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    let req = Request::builder()
        .method("PUT")
        .uri("/galleries/g1/originals/a.jpg")
        .header("authorization", "Bearer tok-u1")
        .header("content-type", "text/html")
        .body(Body::from(vec![0u8; 8]))
        .unwrap();
    let (status, _) = send(&gw, req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn put_rejects_oversized_body() {
    let mut config = Config::default();
    config.server.max_upload_bytes = 1024;
    let gw = gateway_with_config(config);
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    let (status, _) = send(
        &gw,
        put_image("/galleries/g1/originals/a.jpg", "tok-u1", 2048),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn put_with_oversized_declared_length_is_rejected_unread() {
    let mut config = Config::default();
    config.server.max_upload_bytes = 1024;
    let gw = gateway_with_config(config);
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    // The declared length alone trips the ceiling; the tiny actual body
    // never matters.
    let req = Request::builder()
        .method("PUT")
        .uri("/galleries/g1/originals/a.jpg")
        .header("authorization", "Bearer tok-u1")
        .header("content-type", "image/jpeg")
        .header("content-length", "1048576")
        .body(Body::from(vec![0u8; 8]))
        .unwrap();
    let (status, body) = send(&gw, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"], "PayloadTooLarge");
    assert!(gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn put_over_quota_is_403() {
    let mut config = Config::default();
    // A zero-GB free plan makes any upload exceed the ceiling.
    config.quota.free_gb = 0;
    let gw = gateway_with_config(config);
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    gw.docs.insert_user(UserRecord {
        user_id: "u1".into(),
        plan: Some("free".into()),
        plan_override: None,
    });

    let (status, body) = send(
        &gw,
        put_image("/galleries/g1/originals/a.jpg", "tok-u1", 8),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["message"], "Quota exceeded");
    assert!(gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .is_none());
}

// -- Deletes ------------------------------------------------------------------

#[tokio::test]
async fn delete_is_idempotent() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;

    let (status, _) = send(&gw, delete("/galleries/g1/originals/a.jpg", "tok-u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .is_none());

    // Second delete of the same key still succeeds.
    let (status, _) = send(&gw, delete("/galleries/g1/originals/a.jpg", "tok-u1")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_by_non_owner_is_403() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;

    let (status, _) = send(&gw, delete("/galleries/g1/originals/a.jpg", "tok-u2")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn bulk_delete_removes_whole_gallery() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;
    seed_object(&gw.blobs, "galleries/g1/medium/a.jpg", 4).await;
    seed_object(&gw.blobs, "galleries/g1/thumbnails/a.jpg", 2).await;

    let (status, body) = send(&gw, delete("/?prefix=galleries/g1/", "tok-u1")).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["deleted"], 3);

    // A re-run over the now-empty prefix deletes nothing.
    let (status, body) = send(&gw, delete("/?prefix=galleries/g1/", "tok-u1")).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["deleted"], 0);
}

#[tokio::test]
async fn bulk_delete_variant_prefix_is_forbidden() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;

    let (status, _) = send(&gw, delete("/?prefix=galleries/g1/originals/", "tok-u1")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bulk_delete_by_non_owner_is_403() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;

    let (status, _) = send(&gw, delete("/?prefix=galleries/g1/", "tok-u2")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(gw
        .blobs
        .get("galleries/g1/originals/a.jpg")
        .await
        .unwrap()
        .is_some());
}

// -- Share tokens -------------------------------------------------------------

#[tokio::test]
async fn share_token_round_trip() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;

    let req = Request::builder()
        .method("POST")
        .uri("/share-token?galleryId=g1&ttlHours=48")
        .header("authorization", "Bearer tok-u1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&gw, req).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let token = parsed["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert_eq!(parsed["ttlHours"], 48);

    // The gallery is now gated; only the fresh token opens it.
    let (status, _) = send(&gw, get("/galleries/g1/originals/a.jpg")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &gw,
        get(&format!("/galleries/g1/originals/a.jpg?st={token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn share_token_rotation_revokes_old_token() {
    let gw = gateway();
    gw.docs.insert_gallery(gated_gallery("g1", "u1", "old-token"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 8).await;

    let issue = || {
        Request::builder()
            .method("POST")
            .uri("/share-token?galleryId=g1")
            .header("authorization", "Bearer tok-u1")
            .body(Body::empty())
            .unwrap()
    };
    let (status, body) = send(&gw, issue()).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let fresh = parsed["token"].as_str().unwrap().to_string();

    let (status, _) = send(&gw, get("/galleries/g1/originals/a.jpg?st=old-token")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &gw,
        get(&format!("/galleries/g1/originals/a.jpg?st={fresh}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn share_token_issuance_authorization() {
    let gw = gateway();
    gw.docs.insert_gallery(open_gallery("g1", "u1"));

    // Not the owner.
    let req = Request::builder()
        .method("POST")
        .uri("/share-token?galleryId=g1")
        .header("authorization", "Bearer tok-u2")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&gw, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown gallery.
    let req = Request::builder()
        .method("POST")
        .uri("/share-token?galleryId=ghost")
        .header("authorization", "Bearer tok-u1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&gw, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Missing galleryId.
    let req = Request::builder()
        .method("POST")
        .uri("/share-token")
        .header("authorization", "Bearer tok-u1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&gw, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Rate limiting ------------------------------------------------------------

#[tokio::test]
async fn read_rate_limit_returns_429_with_retry_after() {
    let mut config = Config::default();
    config.rate_limit.read_limit = 5;
    config.rate_limit.trust_forwarded_for = true;
    let gw = gateway_with_config(config);
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 1).await;

    let request = || {
        Request::builder()
            .uri("/galleries/g1/originals/a.jpg")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..5 {
        let (status, _) = send(&gw, request()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let response = gw.app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("retry-after").unwrap(), "60");

    // A different client is unaffected.
    let other = Request::builder()
        .uri("/galleries/g1/originals/a.jpg")
        .header("x-forwarded-for", "198.51.100.1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&gw, other).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn forwarded_header_is_ignored_without_trusted_proxy() {
    let mut config = Config::default();
    config.rate_limit.read_limit = 2;
    let gw = gateway_with_config(config);
    gw.docs.insert_gallery(open_gallery("g1", "u1"));
    seed_object(&gw.blobs, "galleries/g1/originals/a.jpg", 1).await;

    // Rotating x-forwarded-for values all land in the same bucket when
    // the header is untrusted.
    for (i, expected) in [
        StatusCode::OK,
        StatusCode::OK,
        StatusCode::TOO_MANY_REQUESTS,
    ]
    .into_iter()
    .enumerate()
    {
        let req = Request::builder()
            .uri("/galleries/g1/originals/a.jpg")
            .header("x-forwarded-for", format!("203.0.113.{i}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&gw, req).await;
        assert_eq!(status, expected);
    }
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let mut config = Config::default();
    config.rate_limit.read_limit = 1;
    let gw = gateway_with_config(config);

    for _ in 0..10 {
        let (status, body) = send(&gw, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }
}

// -- CORS ---------------------------------------------------------------------

#[tokio::test]
async fn preflight_allows_any_origin() {
    let gw = gateway();

    // Full preflight is answered by the CORS layer.
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/galleries/g1/originals/a.jpg")
        .header("origin", "https://gallery.example")
        .header("access-control-request-method", "PUT")
        .body(Body::empty())
        .unwrap();
    let response = gw.app.clone().oneshot(preflight).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
    assert!(response
        .headers()
        .contains_key("access-control-allow-methods"));

    // A plain OPTIONS falls through to the 204 handler, still with the
    // allow-origin header applied.
    let plain = Request::builder()
        .method("OPTIONS")
        .uri("/galleries/g1/originals/a.jpg")
        .header("origin", "https://gallery.example")
        .body(Body::empty())
        .unwrap();
    let response = gw.app.clone().oneshot(plain).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

// -- Error shape --------------------------------------------------------------

#[tokio::test]
async fn errors_are_json_with_stable_codes() {
    let gw = gateway();
    let (status, body) = send(&gw, get("/galleries/../oops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"], "InvalidPath");
    assert!(parsed["message"].as_str().unwrap().len() > 0);
}
