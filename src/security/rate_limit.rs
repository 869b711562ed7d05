//! Fixed-window rate limiting per route group and client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::lifecycle::Shutdown;

/// Ceiling of `max` admitted requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max: u32, window: Duration) -> Self {
        Self { max, window }
    }
}

/// Bucket identity: route group plus client identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    group: Arc<str>,
    client: String,
}

impl BucketKey {
    pub fn new(group: Arc<str>, client: impl Into<String>) -> Self {
        Self {
            group,
            client: client.into(),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `reset_after` is the time left in the current window.
    Allowed { remaining: u32, reset_after: Duration },
    Rejected { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    window: Duration,
    count: u32,
}

/// Shared bucket store.
///
/// Buckets live in a sharded map; the reset/compare/increment sequence for a
/// key runs under that key's entry guard, so concurrent requests for the same
/// key serialize while unrelated keys proceed in parallel.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<BucketKey, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request for `key` under `policy`.
    pub fn admit(&self, key: BucketKey, policy: RateLimitPolicy) -> Decision {
        self.admit_at(key, policy, Instant::now())
    }

    fn admit_at(&self, key: BucketKey, policy: RateLimitPolicy, now: Instant) -> Decision {
        let mut bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            window_start: now,
            window: policy.window,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(bucket.window_start);
        if elapsed >= policy.window {
            bucket.window_start = now;
            bucket.window = policy.window;
            bucket.count = 0;
        }

        let left = policy
            .window
            .saturating_sub(now.saturating_duration_since(bucket.window_start));
        if bucket.count < policy.max {
            bucket.count += 1;
            Decision::Allowed {
                remaining: policy.max - bucket.count,
                reset_after: left,
            }
        } else {
            Decision::Rejected { retry_after: left }
        }
    }

    /// Drop buckets whose window has elapsed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) < bucket.window);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Periodically sweep expired buckets until `shutdown` triggers.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: Shutdown,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, live = self.len(), "Swept expired rate-limit buckets");
                        }
                    }
                    _ = shutdown.triggered() => break,
                }
            }
        })
    }

    #[cfg(test)]
    fn count(&self, key: &BucketKey) -> Option<u32> {
        self.buckets.get(key).map(|bucket| bucket.count)
    }
}
