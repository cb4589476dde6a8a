//! Per-identity submission throttling.
//!
//! Token bucket per authenticated identity, enforced on the server so that
//! a misbehaving client, or several clients sharing one identity, cannot
//! exceed the submission rate.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use domains::{DomainError, Result};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    /// Maximum submissions per window.
    pub requests_per_window: u32,
    pub window_duration: Duration,
    /// Buckets idle longer than this are discarded.
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // Matches the 2 second post cooldown clients apply locally.
            requests_per_window: 1,
            window_duration: Duration::from_secs(2),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// Effectively unlimited; for tests and local tooling.
    pub fn unlimited() -> Self {
        Self {
            requests_per_window: u32::MAX,
            window_duration: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_replenish: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u32) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_replenish: Instant::now(),
        }
    }

    /// Replenishes based on elapsed time, then tries to take one token.
    fn try_consume(&mut self, config: &RateLimitConfig) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_replenish);

        let replenish_rate =
            config.requests_per_window as f64 / config.window_duration.as_secs_f64();
        self.tokens = (self.tokens + elapsed.as_secs_f64() * replenish_rate)
            .min(config.requests_per_window as f64);
        self.last_replenish = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_stale(&self, cleanup_interval: Duration) -> bool {
        self.last_replenish.elapsed() > cleanup_interval
    }
}

pub struct SubmissionThrottle {
    buckets: DashMap<Uuid, TokenBucket>,
    config: RateLimitConfig,
}

impl SubmissionThrottle {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Consumes one submission for `identity` or fails with `RateLimited`.
    pub fn check(&self, identity: Uuid) -> Result<()> {
        if self.buckets.len() > 1024 {
            self.cleanup_stale_buckets();
        }

        let allowed = self
            .buckets
            .entry(identity)
            .or_insert_with(|| TokenBucket::new(self.config.requests_per_window))
            .try_consume(&self.config);

        if allowed {
            Ok(())
        } else {
            warn!(%identity, "submission rate limit exceeded");
            Err(DomainError::RateLimited(format!(
                "at most {} submissions per {}s",
                self.config.requests_per_window,
                self.config.window_duration.as_secs()
            )))
        }
    }

    fn cleanup_stale_buckets(&self) {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_stale(self.config.cleanup_interval));
        let removed = before - self.buckets.len();
        if removed > 0 {
            debug!("Cleaned up {} stale submission buckets", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_token_bucket_basic() {
        let config = RateLimitConfig {
            requests_per_window: 10,
            window_duration: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(60),
        };
        let mut bucket = TokenBucket::new(10);

        for _ in 0..10 {
            assert!(bucket.try_consume(&config));
        }
        assert!(!bucket.try_consume(&config));
    }

    #[test]
    fn identities_are_limited_independently() {
        let throttle = SubmissionThrottle::new(RateLimitConfig {
            requests_per_window: 2,
            window_duration: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(60),
        });
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        assert_ok!(throttle.check(a));
        assert_ok!(throttle.check(a));
        assert!(matches!(throttle.check(a), Err(DomainError::RateLimited(_))));
        assert_ok!(throttle.check(b));
        assert_err!(throttle.check(b).and_then(|_| throttle.check(b)));
    }
}
