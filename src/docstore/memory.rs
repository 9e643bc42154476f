//! In-memory document store.
//!
//! Holds galleries, users and subscriptions in `RwLock<HashMap>` maps.
//! Used for local development and as the substrate for the integration
//! test suite.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::store::{DocumentStore, GalleryRecord, ShareGrant, SubscriptionRecord, UserRecord};

/// In-memory document store backend.
#[derive(Default)]
pub struct MemoryDocumentStore {
    galleries: RwLock<HashMap<String, GalleryRecord>>,
    users: RwLock<HashMap<String, UserRecord>>,
    subscriptions: RwLock<HashMap<String, Vec<SubscriptionRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a gallery record.
    pub fn insert_gallery(&self, record: GalleryRecord) {
        self.galleries
            .write()
            .expect("galleries lock poisoned")
            .insert(record.gallery_id.clone(), record);
    }

    /// Seed or replace a user record.
    pub fn insert_user(&self, record: UserRecord) {
        self.users
            .write()
            .expect("users lock poisoned")
            .insert(record.user_id.clone(), record);
    }

    /// Seed subscriptions for a user.
    pub fn insert_subscriptions(&self, user_id: &str, subs: Vec<SubscriptionRecord>) {
        self.subscriptions
            .write()
            .expect("subscriptions lock poisoned")
            .insert(user_id.to_string(), subs);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_gallery(
        &self,
        gallery_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<GalleryRecord>>> + Send + '_>> {
        let record = self
            .galleries
            .read()
            .expect("galleries lock poisoned")
            .get(gallery_id)
            .cloned();
        Box::pin(async move { Ok(record) })
    }

    fn list_galleries_by_owner(
        &self,
        owner_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let mut ids: Vec<String> = self
            .galleries
            .read()
            .expect("galleries lock poisoned")
            .values()
            .filter(|g| g.owner_id == owner_id)
            .map(|g| g.gallery_id.clone())
            .collect();
        ids.sort();
        Box::pin(async move { Ok(ids) })
    }

    fn set_share_grant(
        &self,
        gallery_id: &str,
        grant: ShareGrant,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let result = {
            let mut galleries = self.galleries.write().expect("galleries lock poisoned");
            match galleries.get_mut(gallery_id) {
                Some(record) => {
                    record.public_share_required = true;
                    record.public_share_token_hash = grant.token_hash;
                    record.public_share_expires_at = Some(grant.expires_at);
                    Ok(())
                }
                None => Err(anyhow::anyhow!("gallery {gallery_id} does not exist")),
            }
        };
        Box::pin(async move { result })
    }

    fn get_user(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UserRecord>>> + Send + '_>> {
        let record = self
            .users
            .read()
            .expect("users lock poisoned")
            .get(user_id)
            .cloned();
        Box::pin(async move { Ok(record) })
    }

    fn list_subscriptions(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SubscriptionRecord>>> + Send + '_>> {
        let subs = self
            .subscriptions
            .read()
            .expect("subscriptions lock poisoned")
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(subs) })
    }
}
