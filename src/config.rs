//! Configuration loading and types for the FotoGate gateway.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, identity verification, the document store, the
//! blob store, quotas, and rate limiting.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity provider settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Document store settings.
    #[serde(default)]
    pub docstore: DocstoreConfig,

    /// Blob store settings.
    #[serde(default)]
    pub blobstore: BlobstoreConfig,

    /// Quota settings.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Ownership cache settings.
    #[serde(default)]
    pub ownership: OwnershipConfig,

    /// Rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted upload body in bytes (default 25 MB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Verifier backend: `firebase` or `static`.
    #[serde(default = "default_identity_mode")]
    pub mode: String,

    /// Provider API key for the introspection endpoint.
    #[serde(default)]
    pub api_key: String,

    /// Override for the introspection endpoint URL (emulators).
    #[serde(default)]
    pub lookup_endpoint: String,

    /// Fixed token -> subject map for the `static` backend.
    #[serde(default)]
    pub static_tokens: HashMap<String, String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: default_identity_mode(),
            api_key: String::new(),
            lookup_endpoint: String::new(),
            static_tokens: HashMap::new(),
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DocstoreConfig {
    /// Backend type: `firestore` or `memory`.
    #[serde(default = "default_docstore_engine")]
    pub engine: String,

    /// Firestore-specific configuration.
    #[serde(default)]
    pub firestore: FirestoreConfig,
}

impl Default for DocstoreConfig {
    fn default() -> Self {
        Self {
            engine: default_docstore_engine(),
            firestore: FirestoreConfig::default(),
        }
    }
}

/// Firestore backend configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FirestoreConfig {
    /// GCP project that owns the database.
    #[serde(default)]
    pub project_id: String,

    /// Override for the REST API base URL (emulators).
    #[serde(default)]
    pub api_base: String,
}

/// Blob store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobstoreConfig {
    /// Backend type: `gcs` or `memory`.
    #[serde(default = "default_blobstore_backend")]
    pub backend: String,

    /// GCS-specific configuration.
    #[serde(default)]
    pub gcs: GcsConfig,
}

impl Default for BlobstoreConfig {
    fn default() -> Self {
        Self {
            backend: default_blobstore_backend(),
            gcs: GcsConfig::default(),
        }
    }
}

/// GCS backend configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GcsConfig {
    /// Backing bucket name.
    #[serde(default)]
    pub bucket: String,

    /// Key prefix applied to every object in the bucket.
    #[serde(default)]
    pub prefix: String,

    /// Override for the JSON API base URL (emulators).
    #[serde(default)]
    pub api_base: String,
}

/// Quota engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Quota cache TTL in seconds.
    #[serde(default = "default_quota_ttl")]
    pub cache_ttl_seconds: u64,

    /// Free plan ceiling in GB.
    #[serde(default = "default_free_gb")]
    pub free_gb: u64,

    /// Pro plan ceiling in GB.
    #[serde(default = "default_pro_gb")]
    pub pro_gb: u64,

    /// Price identifiers that map to the Pro plan.
    #[serde(default)]
    pub pro_price_ids: Vec<String>,

    /// Price identifiers that map to the Unlimited plan.
    #[serde(default)]
    pub unlimited_price_ids: Vec<String>,

    /// Heuristic threshold: an unmatched active subscription priced at or
    /// above this many cents counts as Unlimited.
    #[serde(default = "default_unlimited_cents")]
    pub unlimited_price_cents_min: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_quota_ttl(),
            free_gb: default_free_gb(),
            pro_gb: default_pro_gb(),
            pro_price_ids: Vec::new(),
            unlimited_price_ids: Vec::new(),
            unlimited_price_cents_min: default_unlimited_cents(),
        }
    }
}

/// Ownership cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnershipConfig {
    /// Access-record cache TTL in seconds.
    #[serde(default = "default_ownership_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_ownership_ttl(),
        }
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Window duration in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Ceiling for GET requests per window.
    #[serde(default = "default_read_limit")]
    pub read_limit: u64,

    /// Ceiling for mutating requests per window.
    #[serde(default = "default_write_limit")]
    pub write_limit: u64,

    /// Key clients by the first `x-forwarded-for` hop instead of the peer
    /// address. Enable only behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            read_limit: default_read_limit(),
            write_limit: default_write_limit(),
            trust_forwarded_for: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_identity_mode() -> String {
    "firebase".to_string()
}

fn default_docstore_engine() -> String {
    "firestore".to_string()
}

fn default_blobstore_backend() -> String {
    "gcs".to_string()
}

fn default_quota_ttl() -> u64 {
    30
}

fn default_free_gb() -> u64 {
    2
}

fn default_pro_gb() -> u64 {
    100
}

fn default_unlimited_cents() -> i64 {
    1900
}

fn default_ownership_ttl() -> u64 {
    60
}

fn default_window_seconds() -> u64 {
    60
}

fn default_read_limit() -> u64 {
    300
}

fn default_write_limit() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
