//! Abstract document store trait.
//!
//! The document database owns all resource records; the gateway reads them
//! for authorization and writes only the share-grant fields.  The trait
//! uses `async_trait`-style methods (manual desugaring with pinned
//! futures) so it can back onto both Firestore and the in-memory store.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Gallery access record, read-only apart from the share-grant fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryRecord {
    /// Document ID of the gallery.
    pub gallery_id: String,
    /// Subject that owns the gallery and every object under it.
    pub owner_id: String,
    /// Whether anonymous reads must present a valid share token.
    pub public_share_required: bool,
    /// Hex SHA-256 of the latest issued token. Empty when never issued.
    pub public_share_token_hash: String,
    /// Absolute expiry of the latest grant.
    pub public_share_expires_at: Option<DateTime<Utc>>,
}

/// The share-grant fields written back on token issuance.
///
/// Writing a grant always sets `publicShareRequired = true` and replaces
/// the previous hash, which is what makes rotation immediate.
#[derive(Debug, Clone)]
pub struct ShareGrant {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// User profile record, consulted during plan resolution.
#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub user_id: String,
    /// Stored plan name ("free", "pro", "unlimited"), if any.
    pub plan: Option<String>,
    /// Explicit admin override; takes priority over everything else.
    pub plan_override: Option<String>,
}

/// A billing subscription record attached to a user.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    /// Provider status string ("active", "trialing", "canceled", ...).
    pub status: String,
    /// Provider price identifier, matched against configured sets.
    pub price_id: String,
    /// Unit amount in cents, used only by the last-resort heuristic.
    pub price_amount_cents: Option<i64>,
}

impl SubscriptionRecord {
    /// Whether this subscription currently entitles the user to a paid plan.
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}

/// Async document store contract.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch the access record for `gallery_id`. `None` means the gallery
    /// does not exist.
    fn get_gallery(
        &self,
        gallery_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<GalleryRecord>>> + Send + '_>>;

    /// List the IDs of every gallery owned by `owner_id`.
    fn list_galleries_by_owner(
        &self,
        owner_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>>;

    /// Persist a share grant on `gallery_id`, replacing any previous one.
    fn set_share_grant(
        &self,
        gallery_id: &str,
        grant: ShareGrant,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Fetch the user profile for `user_id`, if present.
    fn get_user(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UserRecord>>> + Send + '_>>;

    /// List every subscription record attached to `user_id`, regardless of
    /// status; callers filter with [`SubscriptionRecord::is_active`].
    fn list_subscriptions(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SubscriptionRecord>>> + Send + '_>>;
}
