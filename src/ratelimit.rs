//! Per-process fixed-window rate limiting.
//!
//! Two independent classes (read and write), each keyed by client network
//! address.  This is a per-instance approximation meant to blunt abusive
//! bursts, not a distributed limiter; concurrent gateway instances each
//! count independently.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Request class with its own ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Read,
    Write,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

/// Map size at which expired buckets are swept before inserting.
const PRUNE_ABOVE: usize = 1024;

struct Bucket {
    window_start: Instant,
    count: u64,
}

/// Fixed-window counter keyed by `(scope, client address)`.
pub struct RateLimiter {
    buckets: Mutex<HashMap<(Scope, String), Bucket>>,
    window: Duration,
    read_limit: u64,
    write_limit: u64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            window: Duration::from_secs(config.window_seconds),
            read_limit: config.read_limit,
            write_limit: config.write_limit,
        }
    }

    fn limit_for(&self, scope: Scope) -> u64 {
        match scope {
            Scope::Read => self.read_limit,
            Scope::Write => self.write_limit,
        }
    }

    /// Count one request from `client_key` and decide whether it may
    /// proceed.
    pub fn check(&self, scope: Scope, client_key: &str) -> RateDecision {
        self.check_at(scope, client_key, Instant::now())
    }

    /// [`check`](Self::check) with an injectable clock.
    pub fn check_at(&self, scope: Scope, client_key: &str, now: Instant) -> RateDecision {
        let limit = self.limit_for(scope);
        let mut buckets = self.buckets.lock().expect("rate limit mutex poisoned");

        // Keys churn (every distinct client address adds one), so the map
        // is swept of expired windows once it grows past a threshold.
        if buckets.len() >= PRUNE_ABOVE {
            let window = self.window;
            buckets.retain(|_, b| now.duration_since(b.window_start) < window);
        }

        let bucket = buckets
            .entry((scope, client_key.to_string()))
            .or_insert(Bucket {
                window_start: now,
                count: 0,
            });

        // A fresh window starts whenever the previous one has elapsed.
        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        bucket.count += 1;
        if bucket.count <= limit {
            RateDecision::Allowed
        } else {
            RateDecision::Limited {
                retry_after_seconds: self.window.as_secs(),
            }
        }
    }

    /// Number of live buckets, for tests.
    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.buckets.lock().expect("rate limit mutex poisoned").len()
    }
}
