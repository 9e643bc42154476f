//! Google Cloud Storage blob store backend.
//!
//! Proxies blob operations to a GCS bucket via the JSON API using
//! `reqwest`.  Keys map to `{prefix}{key}` in the upstream bucket so one
//! bucket can host several deployments.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use super::backend::{BlobMeta, BlobPage, BlobStore, StoredBlob};
use crate::config::GcsConfig;
use crate::gcp::GcpTokenSource;

/// GCS JSON API base URL.
const GCS_API_BASE: &str = "https://storage.googleapis.com";

/// GCS upload base URL (for media uploads).
const GCS_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Everything except unreserved characters gets percent-encoded, including
/// `/`, which must be escaped inside the `/o/{object}` path segment.
const OBJECT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// -- GCS JSON API response types ----------------------------------------------

#[derive(Debug, Deserialize)]
struct GcsObjectMeta {
    name: Option<String>,
    size: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GcsListResponse {
    items: Option<Vec<GcsObjectMeta>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Blob store backed by a GCS bucket.
pub struct GcsBlobStore {
    client: reqwest::Client,
    tokens: Arc<GcpTokenSource>,
    bucket: String,
    /// Key prefix applied to every object in the upstream bucket.
    prefix: String,
    api_base: String,
    upload_base: String,
}

impl GcsBlobStore {
    pub fn new(config: &GcsConfig, tokens: Arc<GcpTokenSource>) -> anyhow::Result<Self> {
        if config.bucket.is_empty() {
            return Err(anyhow::anyhow!("blobstore.gcs.bucket is required"));
        }
        let api_base = if config.api_base.is_empty() {
            GCS_API_BASE.to_string()
        } else {
            config.api_base.trim_end_matches('/').to_string()
        };
        let upload_base = if config.api_base.is_empty() {
            GCS_UPLOAD_BASE.to_string()
        } else {
            format!("{api_base}/upload/storage/v1")
        };
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?,
            tokens,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            api_base,
            upload_base,
        })
    }

    /// Map a gateway key to the upstream object name.
    fn object_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// URL for object-level operations on `key`.
    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            self.bucket,
            utf8_percent_encode(&self.object_name(key), OBJECT_ENCODE_SET)
        )
    }

    fn map_gcs_error(op: &str, status: StatusCode, body: &str) -> anyhow::Error {
        anyhow::anyhow!("GCS {op} failed ({status}): {body}")
    }
}

impl BlobStore for GcsBlobStore {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredBlob>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let url = format!("{}?alt=media", self.object_url(&key));
            debug!("gcs get {key}");

            let resp = self
                .client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("GCS get request failed: {e}"))?;

            if resp.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_gcs_error("get", status, &body));
            }

            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = resp
                .bytes()
                .await
                .map_err(|e| anyhow::anyhow!("GCS get body read failed: {e}"))?;

            Ok(Some(StoredBlob { data, content_type }))
        })
    }

    fn put(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let url = format!(
                "{}/b/{}/o?uploadType=media&name={}",
                self.upload_base,
                self.bucket,
                utf8_percent_encode(&self.object_name(&key), OBJECT_ENCODE_SET)
            );
            debug!("gcs put {key} ({} bytes)", data.len());

            let resp = self
                .client
                .post(&url)
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(data)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("GCS put request failed: {e}"))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_gcs_error("put", status, &body));
            }
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let url = self.object_url(&key);
            debug!("gcs delete {key}");

            let resp = self
                .client
                .delete(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("GCS delete request failed: {e}"))?;

            // Deleting a missing key is a success: the gateway's DELETE is
            // idempotent.
            if resp.status() == StatusCode::NOT_FOUND || resp.status().is_success() {
                return Ok(());
            }
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(Self::map_gcs_error("delete", status, &body))
        })
    }

    fn list(
        &self,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BlobPage>> + Send + '_>> {
        let prefix = prefix.to_string();
        let page_token = page_token.map(str::to_string);
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let mut url = format!(
                "{}/storage/v1/b/{}/o?prefix={}&fields=items(name,size,updated),nextPageToken",
                self.api_base,
                self.bucket,
                utf8_percent_encode(&self.object_name(&prefix), OBJECT_ENCODE_SET)
            );
            if let Some(ref t) = page_token {
                url.push_str("&pageToken=");
                url.push_str(&utf8_percent_encode(t, OBJECT_ENCODE_SET).to_string());
            }

            let resp = self
                .client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("GCS list request failed: {e}"))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_gcs_error("list", status, &body));
            }

            let list_resp: GcsListResponse = resp.json().await?;
            let items = list_resp
                .items
                .unwrap_or_default()
                .into_iter()
                .filter_map(|item| {
                    let name = item.name?;
                    // Strip the deployment prefix back off.
                    let key = name.strip_prefix(&self.prefix)?.to_string();
                    Some(BlobMeta {
                        key,
                        size: item.size.and_then(|s| s.parse().ok()).unwrap_or(0),
                        last_modified: item
                            .updated
                            .as_deref()
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(Utc::now),
                    })
                })
                .collect();

            Ok(BlobPage {
                items,
                next_page_token: list_resp.next_page_token,
            })
        })
    }
}
