// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Distributed KV tier, reached through a bounded connection pool.
//!
//! Connectivity failures never propagate to callers: a failed `get` is
//! treated as a miss, and a failed `set` is retried with bounded backoff
//! before being silently dropped.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use tracing::warn;

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub struct RemotePoolConfig {
    pub redis_url: String,
    pub pool_size: usize,
    pub min_idle: usize,
    pub dial_timeout: Duration,
    pub io_timeout: Duration,
    pub default_ttl: Duration,
}

impl Default for RemotePoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".into(),
            pool_size: 50,
            min_idle: 10,
            dial_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(3),
            default_ttl: Duration::from_secs(3600),
        }
    }
}

/// A distributed, byte-in/byte-out key-value store. Implemented by
/// [`RedisKvStore`] in production and by in-memory fakes in tests.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Bytes>;
    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> bool;
    async fn del(&self, key: &str);
    async fn ping(&self) -> bool;
}

/// Production [`KvStore`] backed by a RESP server (Redis-compatible) over
/// a pooled connection manager.
pub struct RedisKvStore {
    pool: Pool,
    io_timeout: Duration,
}

impl RedisKvStore {
    pub fn new(config: &RemotePoolConfig) -> Result<Self, deadpool_redis::CreatePoolError> {
        let mut pool_config = PoolConfig::from_url(&config.redis_url);
        pool_config.pool = Some(deadpool_redis::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });
        let pool = pool_config.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self {
            pool,
            io_timeout: config.io_timeout,
        })
    }

    async fn connection(&self) -> Option<deadpool_redis::Connection> {
        match self.pool.get().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(error = %err, "failed to obtain redis connection");
                None
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut conn = self.connection().await?;
        let fut = conn.get::<_, Option<Vec<u8>>>(key);
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(Ok(Some(bytes))) => {
                metrics::counter!("rdap_cache_remote_hits_total").increment(1);
                Some(Bytes::from(bytes))
            }
            Ok(Ok(None)) => {
                metrics::counter!("rdap_cache_remote_misses_total").increment(1);
                None
            }
            Ok(Err(err)) => {
                warn!(error = %err, "remote cache GET failed");
                metrics::counter!("rdap_cache_remote_errors_total").increment(1);
                None
            }
            Err(_) => {
                warn!("remote cache GET timed out");
                metrics::counter!("rdap_cache_remote_errors_total").increment(1);
                None
            }
        }
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> bool {
        const MAX_ATTEMPTS: u32 = 3;
        for attempt in 1..=MAX_ATTEMPTS {
            let Some(mut conn) = self.connection().await else {
                backoff(attempt).await;
                continue;
            };
            let ttl_secs = ttl.as_secs().max(1);
            let fut: redis::RedisFuture<()> =
                Box::pin(conn.set_ex(key, value.to_vec(), ttl_secs));
            match tokio::time::timeout(self.io_timeout, fut).await {
                Ok(Ok(())) => return true,
                Ok(Err(err)) => warn!(error = %err, attempt, "remote cache SETEX failed"),
                Err(_) => warn!(attempt, "remote cache SETEX timed out"),
            }
            backoff(attempt).await;
        }
        metrics::counter!("rdap_cache_remote_errors_total").increment(1);
        false
    }

    async fn del(&self, key: &str) {
        if let Some(mut conn) = self.connection().await {
            let fut: redis::RedisFuture<()> = Box::pin(conn.del(key));
            if let Err(err) = tokio::time::timeout(self.io_timeout, fut).await {
                warn!(?err, "remote cache DEL timed out");
            }
        }
    }

    async fn ping(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let fut: redis::RedisFuture<String> = Box::pin(redis::cmd("PING").query_async(&mut conn));
        matches!(tokio::time::timeout(self.io_timeout, fut).await, Ok(Ok(_)))
    }
}

/// `backoff = 100ms * attempt`.
async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use dashmap::DashMap;

    /// In-memory [`KvStore`] for tests that don't need a live Redis.
    #[derive(Default)]
    pub struct InMemoryKvStore {
        entries: DashMap<String, Bytes>,
        pub fail_writes: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl KvStore for InMemoryKvStore {
        async fn get(&self, key: &str) -> Option<Bytes> {
            self.entries.get(key).map(|v| v.clone())
        }

        async fn set_ex(&self, key: &str, value: Bytes, _ttl: Duration) -> bool {
            if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
                return false;
            }
            self.entries.insert(key.to_string(), value);
            true
        }

        async fn del(&self, key: &str) {
            self.entries.remove(key);
        }

        async fn ping(&self) -> bool {
            true
        }
    }
}
