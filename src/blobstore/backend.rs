//! Abstract blob store trait.
//!
//! Every blob backend must implement [`BlobStore`].  The trait works in
//! terms of opaque byte payloads plus the small amount of metadata the
//! gateway surfaces (size, content type, last-modified).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// A stored blob's bytes plus its stored content type.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// Listing metadata for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone)]
pub struct BlobPage {
    pub items: Vec<BlobMeta>,
    /// Opaque continuation token; `None` on the final page.
    pub next_page_token: Option<String>,
}

/// Async blob storage contract.
pub trait BlobStore: Send + Sync + 'static {
    /// Read the blob at `key`. `None` means the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredBlob>>> + Send + '_>>;

    /// Write `data` at `key` with the given content type, replacing any
    /// previous object.
    fn put(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Delete the blob at `key`. Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// List one page of keys under `prefix`.
    fn list(
        &self,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BlobPage>> + Send + '_>>;
}

/// Accumulate every page of a prefix listing.
pub async fn list_all(store: &dyn BlobStore, prefix: &str) -> anyhow::Result<Vec<BlobMeta>> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = store.list(prefix, page_token.as_deref()).await?;
        items.extend(page.items);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
    Ok(items)
}
