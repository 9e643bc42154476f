//! FotoGate: an object storage access gateway for multi-tenant photo
//! galleries.
//!
//! The gateway fronts a blob store with a gallery-aware authorization
//! layer: path classification, public-read policy, share-token gating,
//! bearer-identity ownership checks, per-user storage quotas, and
//! per-client rate limiting.

use std::sync::Arc;
use std::time::Duration;

pub mod blobstore;
pub mod config;
pub mod docstore;
pub mod errors;
pub mod gcp;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod ownership;
pub mod paths;
pub mod policy;
pub mod quota;
pub mod ratelimit;
pub mod server;
pub mod share;

use blobstore::backend::BlobStore;
use config::Config;
use docstore::store::DocumentStore;
use identity::IdentityVerifier;
use ownership::Ownership;
use quota::QuotaEngine;
use ratelimit::RateLimiter;

/// Shared application state threaded through every handler.
pub struct AppState {
    pub config: Config,
    pub docs: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub ownership: Ownership,
    pub quota: QuotaEngine,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Assemble the state from a config and the chosen backends. Cache
    /// TTLs and rate ceilings come from the config.
    pub fn new(
        config: Config,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let ownership = Ownership::new(Duration::from_secs(config.ownership.cache_ttl_seconds));
        let quota = QuotaEngine::new(config.quota.clone());
        let limiter = RateLimiter::new(&config.rate_limit);
        Self {
            config,
            docs,
            blobs,
            identity,
            ownership,
            quota,
            limiter,
        }
    }
}
