// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-client sliding-window rate limiting over a shared ordered set.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::GatewayError;

/// Endpoint classes carry their own per-minute budget; anything else
/// falls back to `default_max`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub per_endpoint_max: HashMap<String, u64>,
    pub default_max: u64,
    /// If true, a shared-store failure admits the request instead of
    /// rejecting with 500. Defaults to rejecting.
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut per_endpoint_max = HashMap::new();
        per_endpoint_max.insert("ip".to_string(), 100);
        per_endpoint_max.insert("domain".to_string(), 200);
        per_endpoint_max.insert("autnum".to_string(), 150);
        Self {
            window: Duration::from_secs(60),
            per_endpoint_max,
            default_max: 50,
            fail_open: false,
        }
    }
}

impl RateLimitConfig {
    fn max_for(&self, endpoint_class: &str) -> u64 {
        self.per_endpoint_max
            .get(endpoint_class)
            .copied()
            .unwrap_or(self.default_max)
    }
}

/// Result of one admission check.
pub enum Admission {
    Allow,
    Deny { retry_after_secs: u64 },
}

/// The sliding-window primitive: remove expired members, record the
/// current instant, and report the surviving count plus the oldest
/// remaining member's timestamp.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Returns `(count_after_insert, oldest_remaining_ms)`, or `None` on
    /// a store failure.
    async fn slide(&self, key: &str, now_ms: i64, window_ms: i64) -> Option<(u64, Option<i64>)>;
}

pub struct RedisRateLimitStore {
    pool: Pool,
    io_timeout: Duration,
}

impl RedisRateLimitStore {
    pub fn new(pool: Pool, io_timeout: Duration) -> Self {
        Self { pool, io_timeout }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn slide(&self, key: &str, now_ms: i64, window_ms: i64) -> Option<(u64, Option<i64>)> {
        let mut conn = match self.pool.get().await {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "rate limiter: failed to obtain connection");
                return None;
            }
        };

        let window_start = now_ms - window_ms;
        let window_secs = (window_ms as u64 / 1000).max(1);

        let fut = async {
            let _: () = conn.zrembyscore(key, 0, window_start).await?;
            let _: () = conn.zadd(key, now_ms, now_ms).await?;
            let count: u64 = conn.zcard(key).await?;
            let oldest: Vec<i64> = conn.zrangebyscore_limit(key, 0, "+inf", 0, 1).await?;
            let _: () = conn.expire(key, window_secs as i64).await?;
            Ok::<_, redis::RedisError>((count, oldest.into_iter().next()))
        };

        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(err)) => {
                warn!(error = %err, "rate limiter: redis pipeline failed");
                None
            }
            Err(_) => {
                warn!("rate limiter: redis pipeline timed out");
                None
            }
        }
    }
}

/// Deterministic in-memory store for tests: callers pass `now_ms`
/// explicitly so tests never depend on wall-clock timing.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: parking_lot::Mutex<HashMap<String, VecDeque<i64>>>,
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn slide(&self, key: &str, now_ms: i64, window_ms: i64) -> Option<(u64, Option<i64>)> {
        let mut windows = self.windows.lock();
        let entries = windows.entry(key.to_string()).or_default();
        let window_start = now_ms - window_ms;
        while matches!(entries.front(), Some(ts) if *ts < window_start) {
            entries.pop_front();
        }
        entries.push_back(now_ms);
        Some((entries.len() as u64, entries.front().copied()))
    }
}

/// Sliding-window admission control per `(clientID, endpointClass)`.
pub struct RateLimiter<S: RateLimitStore> {
    store: S,
    config: RateLimitConfig,
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub async fn admit(&self, client_id: &str, endpoint_class: &str, now_ms: i64) -> Result<Admission, GatewayError> {
        let key = format!("ratelimit:{client_id}:{endpoint_class}");
        let window_ms = self.config.window.as_millis() as i64;

        let Some((count, oldest)) = self.store.slide(&key, now_ms, window_ms).await else {
            return if self.config.fail_open {
                Ok(Admission::Allow)
            } else {
                Err(GatewayError::Internal(
                    "rate limit store unavailable".to_string(),
                ))
            };
        };

        let max = self.config.max_for(endpoint_class);
        if count <= max {
            metrics::counter!("rdap_ratelimit_allowed_total").increment(1);
            Ok(Admission::Allow)
        } else {
            metrics::counter!("rdap_ratelimit_denied_total").increment(1);
            let oldest = oldest.unwrap_or(now_ms);
            let window_secs = self.config.window.as_secs() as i64;
            let elapsed_secs = (now_ms - oldest) / 1000;
            let retry_after_secs = (window_secs - elapsed_secs).max(0) as u64;
            Ok(Admission::Deny { retry_after_secs })
        }
    }
}
