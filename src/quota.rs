//! Per-subject storage quota enforcement.
//!
//! Usage is the sum of object sizes under every gallery subtree the
//! subject owns, computed from live blob listings and cached briefly.
//! The ceiling derives from the subject's plan.  Uploads reserve
//! optimistically against the cached total; deletes invalidate the entry
//! so the next upload recomputes from the authoritative listing.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::blobstore::backend::{list_all, BlobStore};
use crate::config::QuotaConfig;
use crate::docstore::store::DocumentStore;

/// How many gallery subtrees are summed concurrently.
const USAGE_CONCURRENCY: usize = 4;

/// Subscription plan tier. Ceilings are monotonic: Free < Pro < Unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Plan {
    Free,
    Pro,
    Unlimited,
}

impl Plan {
    /// Parse a stored plan name; unknown names are treated as absent.
    pub fn parse(name: &str) -> Option<Plan> {
        match name.to_ascii_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "unlimited" => Some(Plan::Unlimited),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Unlimited => "unlimited",
        }
    }

    /// Byte ceiling for this plan.
    pub fn limit_bytes(&self, config: &QuotaConfig) -> u64 {
        const GB: u64 = 1024 * 1024 * 1024;
        match self {
            Plan::Free => config.free_gb * GB,
            Plan::Pro => config.pro_gb * GB,
            Plan::Unlimited => u64::MAX,
        }
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Ok,
    Exceeded { used_bytes: u64, limit_bytes: u64 },
}

struct QuotaEntry {
    plan: Plan,
    limit_bytes: u64,
    used_bytes: u64,
    inserted_at: Instant,
}

/// Quota cache plus plan/usage resolution.
pub struct QuotaEngine {
    cache: Mutex<HashMap<String, QuotaEntry>>,
    ttl: Duration,
    config: QuotaConfig,
}

impl QuotaEngine {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(config.cache_ttl_seconds),
            config,
        }
    }

    /// Check whether `subject` may upload `upload_bytes` more bytes.
    ///
    /// Does not mutate the cache beyond (re)populating it on a miss; call
    /// [`commit`](Self::commit) once the blob write has actually succeeded.
    pub async fn check(
        &self,
        docs: &dyn DocumentStore,
        blobs: &dyn BlobStore,
        subject: &str,
        upload_bytes: u64,
    ) -> anyhow::Result<QuotaDecision> {
        {
            let cache = self.cache.lock().expect("quota cache mutex poisoned");
            if let Some(entry) = cache.get(subject) {
                if entry.inserted_at.elapsed() < self.ttl {
                    return Ok(Self::decide(entry.used_bytes, entry.limit_bytes, upload_bytes));
                }
            }
        }

        let plan = self.resolve_plan(docs, subject).await?;
        let limit_bytes = plan.limit_bytes(&self.config);
        let used_bytes = self.compute_used_bytes(docs, blobs, subject).await?;
        debug!(
            "quota recomputed for {subject}: plan={} used={used_bytes} limit={limit_bytes}",
            plan.as_str()
        );

        {
            let mut cache = self.cache.lock().expect("quota cache mutex poisoned");
            cache.insert(
                subject.to_string(),
                QuotaEntry {
                    plan,
                    limit_bytes,
                    used_bytes,
                    inserted_at: Instant::now(),
                },
            );
        }

        Ok(Self::decide(used_bytes, limit_bytes, upload_bytes))
    }

    fn decide(used_bytes: u64, limit_bytes: u64, upload_bytes: u64) -> QuotaDecision {
        match used_bytes.checked_add(upload_bytes) {
            Some(total) if total <= limit_bytes => QuotaDecision::Ok,
            _ => QuotaDecision::Exceeded {
                used_bytes,
                limit_bytes,
            },
        }
    }

    /// Record an accepted upload in the cached usage.  Called only after
    /// the blob write succeeded, so a failed write never inflates the
    /// estimate.
    pub fn commit(&self, subject: &str, upload_bytes: u64) {
        let mut cache = self.cache.lock().expect("quota cache mutex poisoned");
        if let Some(entry) = cache.get_mut(subject) {
            entry.used_bytes = entry.used_bytes.saturating_add(upload_bytes);
        }
    }

    /// Drop the cached state for `subject` so the next check recomputes
    /// from the authoritative listing.
    pub fn invalidate(&self, subject: &str) {
        let mut cache = self.cache.lock().expect("quota cache mutex poisoned");
        cache.remove(subject);
    }

    /// The cached usage for a subject, for tests and introspection.
    pub fn cached_used_bytes(&self, subject: &str) -> Option<u64> {
        let cache = self.cache.lock().expect("quota cache mutex poisoned");
        cache.get(subject).map(|e| e.used_bytes)
    }

    /// Resolve the subject's plan.
    ///
    /// Priority: explicit admin override, then the highest tier among
    /// active subscriptions, then the profile's stored plan, then Free.
    async fn resolve_plan(&self, docs: &dyn DocumentStore, subject: &str) -> anyhow::Result<Plan> {
        let user = docs.get_user(subject).await?;

        if let Some(plan) = user
            .as_ref()
            .and_then(|u| u.plan_override.as_deref())
            .and_then(Plan::parse)
        {
            return Ok(plan);
        }

        let subscriptions = docs.list_subscriptions(subject).await?;
        let subscribed = subscriptions
            .iter()
            .filter(|sub| sub.is_active())
            .filter_map(|sub| {
                if self.config.unlimited_price_ids.contains(&sub.price_id) {
                    return Some(Plan::Unlimited);
                }
                if self.config.pro_price_ids.contains(&sub.price_id) {
                    return Some(Plan::Pro);
                }
                // Last-resort guess: no configured price ID matched, so
                // infer the tier from the price amount. Approximate only.
                match sub.price_amount_cents {
                    Some(cents) if cents >= self.config.unlimited_price_cents_min => {
                        Some(Plan::Unlimited)
                    }
                    Some(cents) if cents > 0 => Some(Plan::Pro),
                    _ => None,
                }
            })
            .max();
        if let Some(plan) = subscribed {
            return Ok(plan);
        }

        if let Some(plan) = user.and_then(|u| u.plan).and_then(|p| Plan::parse(&p)) {
            return Ok(plan);
        }

        Ok(Plan::Free)
    }

    /// Sum object sizes under every gallery subtree the subject owns,
    /// with bounded concurrency across galleries.
    async fn compute_used_bytes(
        &self,
        docs: &dyn DocumentStore,
        blobs: &dyn BlobStore,
        subject: &str,
    ) -> anyhow::Result<u64> {
        let gallery_ids = docs.list_galleries_by_owner(subject).await?;

        let totals: Vec<u64> = stream::iter(gallery_ids)
            .map(|gallery_id| async move {
                let items = list_all(blobs, &format!("galleries/{gallery_id}/")).await?;
                Ok::<u64, anyhow::Error>(items.iter().map(|m| m.size).sum())
            })
            .buffer_unordered(USAGE_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(totals.iter().sum())
    }
}
