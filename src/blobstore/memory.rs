//! In-memory blob store backend.
//!
//! Objects are held in a `tokio::sync::RwLock<HashMap>` keyed by full
//! object key.  Listing pages through a sorted snapshot of matching keys
//! so pagination behaves like the cloud backend.  Used for development
//! and the integration test suite.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::backend::{BlobMeta, BlobPage, BlobStore, StoredBlob};

/// Default listing page size, mirroring the cloud API default.
const DEFAULT_PAGE_SIZE: usize = 1000;

struct Entry {
    data: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// In-memory blob store.
pub struct MemoryBlobStore {
    objects: tokio::sync::RwLock<HashMap<String, Entry>>,
    page_size: usize,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Build a store with a small page size to exercise pagination.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: tokio::sync::RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredBlob>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects.get(&key).map(|entry| StoredBlob {
                data: entry.data.clone(),
                content_type: entry.content_type.clone(),
            }))
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
            let mut objects = self.objects.write().await;
            objects.insert(
                key,
                Entry {
                    data,
                    content_type,
                    last_modified: Utc::now(),
                },
            );
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            objects.remove(&key);
            Ok(())
        })
    }

    fn list(
        &self,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BlobPage>> + Send + '_>> {
        let prefix = prefix.to_string();
        // The page token is the last key of the previous page.
        let after = page_token.map(str::to_string);
        Box::pin(async move {
            let objects = self.objects.read().await;
            let mut keys: Vec<&String> = objects
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .filter(|k| after.as_deref().is_none_or(|a| k.as_str() > a))
                .collect();
            keys.sort();

            let truncated = keys.len() > self.page_size;
            keys.truncate(self.page_size);

            let items: Vec<BlobMeta> = keys
                .iter()
                .map(|k| {
                    let entry = &objects[*k];
                    BlobMeta {
                        key: (**k).clone(),
                        size: entry.data.len() as u64,
                        last_modified: entry.last_modified,
                    }
                })
                .collect();

            let next_page_token = if truncated {
                items.last().map(|m| m.key.clone())
            } else {
                None
            };

            Ok(BlobPage {
                items,
                next_page_token,
            })
        })
    }
}
