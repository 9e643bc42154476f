//! Share-token protocol: issuance and validation of capability tokens
//! that grant anonymous access to share-gated galleries.
//!
//! A token is 32 random bytes, hex-encoded.  Only its SHA-256 hash is
//! persisted on the gallery access record; the raw token is returned to
//! the owner exactly once.  Validation recomputes the hash and compares it
//! in constant time.  Expired, missing and mismatched tokens are treated
//! identically so anonymous callers cannot distinguish them.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::docstore::store::GalleryRecord;

/// Token entropy in bytes. The protocol requires at least 24.
const TOKEN_BYTES: usize = 32;

/// Smallest accepted TTL.
pub const MIN_TTL_HOURS: u64 = 1;

/// Largest accepted TTL (365 days).
pub const MAX_TTL_HOURS: u64 = 365 * 24;

/// TTL applied when the caller does not supply one (30 days).
pub const DEFAULT_TTL_HOURS: u64 = 30 * 24;

/// A freshly issued share token.
///
/// `token` is handed to the caller; only `token_hash` and `expires_at`
/// are persisted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_hours: u64,
}

/// Clamp a caller-supplied TTL into the accepted range, defaulting when
/// absent.
pub fn clamp_ttl_hours(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_TTL_HOURS)
        .clamp(MIN_TTL_HOURS, MAX_TTL_HOURS)
}

/// SHA-256 of a raw token, hex-encoded.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a new token and its persistence material.
pub fn issue(requested_ttl_hours: Option<u64>, now: DateTime<Utc>) -> IssuedToken {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    let token = hex::encode(bytes);
    let token_hash = hash_token(&token);
    let ttl_hours = clamp_ttl_hours(requested_ttl_hours);
    let expires_at = now + Duration::hours(ttl_hours as i64);
    IssuedToken {
        token,
        token_hash,
        expires_at,
        ttl_hours,
    }
}

/// Decide whether an anonymous read of a share-gated gallery may proceed.
///
/// Returns `true` when the record does not require a share token, or when
/// `presented` hashes to the stored hash and the grant has not expired.
/// The hash comparison is constant-time over the decoded digest bytes.
pub fn validate(record: &GalleryRecord, presented: Option<&str>, now: DateTime<Utc>) -> bool {
    if !record.public_share_required {
        return true;
    }

    let Some(token) = presented else {
        return false;
    };

    let Ok(stored) = hex::decode(&record.public_share_token_hash) else {
        return false;
    };
    if stored.len() != 32 {
        return false;
    }

    let computed = Sha256::digest(token.as_bytes());
    if computed.as_slice().ct_eq(stored.as_slice()).unwrap_u8() != 1 {
        return false;
    }

    match record.public_share_expires_at {
        Some(expires_at) => now < expires_at,
        // A grant without an expiry was never written by this gateway.
        None => false,
    }
}
