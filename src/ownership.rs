//! Ownership resolution with a short-TTL access-record cache.
//!
//! Maps a classified location to the subject that owns it.  Gallery
//! ownership comes from the gallery access record in the document store;
//! branding ownership is encoded in the path itself.  Cached records are
//! advisory acceleration only: a miss always triggers a fresh
//! authoritative read, and every mutation that could change the answer
//! invalidates the entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::docstore::store::{DocumentStore, GalleryRecord};
use crate::errors::GatewayError;
use crate::paths::Location;

struct CachedRecord {
    record: GalleryRecord,
    inserted_at: Instant,
}

/// Access-record cache plus resolution logic.
pub struct Ownership {
    cache: Mutex<HashMap<String, CachedRecord>>,
    ttl: Duration,
}

impl Ownership {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Fetch the access record for a gallery, consulting the cache first.
    ///
    /// `Ok(None)` means the gallery does not exist (callers map to 404).
    pub async fn gallery_record(
        &self,
        docs: &dyn DocumentStore,
        gallery_id: &str,
    ) -> Result<Option<GalleryRecord>, GatewayError> {
        {
            let cache = self.cache.lock().expect("ownership cache mutex poisoned");
            if let Some(cached) = cache.get(gallery_id) {
                if cached.inserted_at.elapsed() < self.ttl {
                    return Ok(Some(cached.record.clone()));
                }
            }
        }

        let record = docs.get_gallery(gallery_id).await?;
        if let Some(ref record) = record {
            let mut cache = self.cache.lock().expect("ownership cache mutex poisoned");
            cache.insert(
                gallery_id.to_string(),
                CachedRecord {
                    record: record.clone(),
                    inserted_at: Instant::now(),
                },
            );
        }
        Ok(record)
    }

    /// Drop the cached record for a gallery.
    pub fn invalidate(&self, gallery_id: &str) {
        let mut cache = self.cache.lock().expect("ownership cache mutex poisoned");
        cache.remove(gallery_id);
    }

    /// Resolve the owning subject of a location.
    ///
    /// `Ok(None)` means the backing resource record is missing.
    pub async fn resolve_owner(
        &self,
        docs: &dyn DocumentStore,
        loc: &Location,
    ) -> Result<Option<String>, GatewayError> {
        if let Some(owner) = loc.branding_owner() {
            return Ok(Some(owner.to_string()));
        }
        let gallery_id = loc
            .gallery_id()
            .expect("location is neither gallery nor branding");
        Ok(self
            .gallery_record(docs, gallery_id)
            .await?
            .map(|record| record.owner_id))
    }

    /// The composed write-authorization check: the verified subject must
    /// own the resource.  A valid identity that does not own the resource
    /// is `Forbidden`, never `Unauthenticated`.
    pub async fn authorize_write(
        &self,
        docs: &dyn DocumentStore,
        loc: &Location,
        subject: &str,
    ) -> Result<(), GatewayError> {
        match self.resolve_owner(docs, loc).await? {
            None => Err(GatewayError::NotFound {
                resource: loc.gallery_id().unwrap_or_default().to_string(),
            }),
            Some(owner) if owner == subject => Ok(()),
            Some(_) => Err(GatewayError::Forbidden {
                message: "You do not own this resource".to_string(),
            }),
        }
    }
}
