// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Two-tier read-through cache: a local byte store in front of a
//! distributed KV store, unified behind one `get`/`set`/`del` API.

mod local;
mod remote;

pub use local::{LocalCache, DEFAULT_BUDGET_BYTES};
pub use remote::{KvStore, RedisKvStore, RemotePoolConfig};

#[cfg(test)]
pub use remote::fake::InMemoryKvStore;

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Unifies the local and remote tiers behind one read-through API.
pub struct TwoTierCache<R: KvStore> {
    local: LocalCache,
    remote: Arc<R>,
    ttl: Duration,
}

impl<R: KvStore> TwoTierCache<R> {
    pub fn new(local_budget_bytes: u64, remote: Arc<R>, ttl: Duration) -> Self {
        Self {
            local: LocalCache::new(local_budget_bytes),
            remote,
            ttl,
        }
    }

    /// Local hit short-circuits with no remote I/O. Remote hit populates
    /// the local tier before returning.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(bytes) = self.local.get(key) {
            return Some(bytes);
        }
        if let Some(bytes) = self.remote.get(key).await {
            self.local.set(key.to_string(), bytes.clone());
            return Some(bytes);
        }
        None
    }

    /// Write-through: local synchronously, remote best-effort. A remote
    /// write failure never fails the caller.
    pub async fn set(&self, key: &str, value: Bytes) {
        self.local.set(key.to_string(), value.clone());
        let _ = self.remote.set_ex(key, value, self.ttl).await;
    }

    pub async fn del(&self, key: &str) {
        self.local.del(key);
        self.remote.del(key).await;
    }

    pub fn local_bytes_used(&self) -> u64 {
        self.local.bytes_used()
    }
}
