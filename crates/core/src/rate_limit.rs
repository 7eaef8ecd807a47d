//! Fixed-window rate limiting.
//!
//! Each [`FixedWindowLimiter`] owns its own keyed counter table, so limiters
//! never share quota. The table is split into independently locked shards:
//! a request only contends with requests whose keys hash to the same shard,
//! and the increment for a key is atomic under that shard's lock.
//!
//! Time is passed in explicitly (`*_at` methods) so the window arithmetic is
//! deterministic under test; the plain methods use [`Instant::now`].

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::CoreError;

/// Number of lock shards per limiter.
const DEFAULT_SHARDS: usize = 16;

/// Bucket used when the client address could not be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

// ---------------------------------------------------------------------------
// Policy and outcome
// ---------------------------------------------------------------------------

/// Static configuration of one limiter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Short name used in logs (e.g. `"login"`).
    pub name: &'static str,
    /// Maximum number of actions allowed per window.
    pub max_requests: u32,
    /// Length of one window.
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            max_requests,
            window,
        }
    }

    /// Reject degenerate policies. A zero window restarts on every call and
    /// so never limits; a zero limit admits nobody.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window.is_zero() {
            return Err(CoreError::Validation(format!(
                "{} rate limit window must be greater than zero",
                self.name
            )));
        }
        if self.max_requests == 0 {
            return Err(CoreError::Validation(format!(
                "{} rate limit must allow at least one request",
                self.name
            )));
        }
        Ok(())
    }
}

/// Result of recording one action against a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// The policy limit, for the `ratelimit-limit` header.
    pub limit: u32,
    /// Actions left in the current window after this one.
    pub remaining: u32,
    /// Time until the current window ends and the counter resets.
    pub reset_after: Duration,
}

impl RateLimitOutcome {
    /// Seconds until reset, rounded up so a client never retries early.
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

// ---------------------------------------------------------------------------
// Limiter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start: Instant,
    count: u32,
}

/// A fixed-window counter table for a single action family.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    policy: RateLimitPolicy,
    shards: Box<[Mutex<HashMap<String, WindowCounter>>]>,
    hasher: RandomState,
}

impl FixedWindowLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_shards(policy, DEFAULT_SHARDS)
    }

    /// Create a limiter with an explicit shard count (minimum 1).
    pub fn with_shards(policy: RateLimitPolicy, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            policy,
            shards,
            hasher: RandomState::new(),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Record one action for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateLimitOutcome {
        self.check_at(key, Instant::now())
    }

    /// Record one action for `key` at `now`.
    ///
    /// A counter whose window has elapsed is reset before counting, so stale
    /// windows never contribute to a decision. The action is rejected when
    /// the post-increment count exceeds the policy limit.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitOutcome {
        let window = self.policy.window;
        let mut shard = self.lock_shard(key);

        let counter = shard.entry(key.to_owned()).or_insert(WindowCounter {
            window_start: now,
            count: 0,
        });

        if now.saturating_duration_since(counter.window_start) >= window {
            counter.window_start = now;
            counter.count = 0;
        }
        counter.count = counter.count.saturating_add(1);

        let elapsed = now.saturating_duration_since(counter.window_start);
        RateLimitOutcome {
            allowed: counter.count <= self.policy.max_requests,
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests.saturating_sub(counter.count),
            reset_after: window.saturating_sub(elapsed),
        }
    }

    /// Drop counters whose window ended before `now`. Returns how many were removed.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let window = self.policy.window;
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
                let before = shard.len();
                shard.retain(|_, c| now.saturating_duration_since(c.window_start) < window);
                before - shard.len()
            })
            .sum()
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Number of keys currently tracked across all shards.
    pub fn tracked_keys(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    fn lock_shard(&self, key: &str) -> MutexGuard<'_, HashMap<String, WindowCounter>> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        // A panic while holding a shard cannot leave a counter half-updated,
        // so a poisoned lock is still safe to use.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Keys and hints
// ---------------------------------------------------------------------------

/// Build a composite limiter key from the client address and an optional
/// action discriminator (email, user id).
///
/// A missing address collapses into the shared [`UNKNOWN_CLIENT`] bucket,
/// which is still limited.
pub fn composite_key(client: Option<&str>, discriminator: Option<&str>) -> String {
    let client = client
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CLIENT);
    match discriminator {
        Some(d) => format!("{client}:{d}"),
        None => client.to_string(),
    }
}

/// Describe a duration for a `retryAfter` hint, e.g. `"15 minutes"`.
///
/// Rounds up to whole minutes; exact multiples of an hour are shown in hours.
pub fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    let minutes = secs.div_ceil(60).max(1);
    if minutes % 60 == 0 {
        let hours = minutes / 60;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}
