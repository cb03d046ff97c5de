// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process byte-budgeted local tier.
//!
//! Stores raw bytes only -- responses are cached as opaque payloads rather
//! than parsed. Eviction is plain LRU over a fixed byte budget; the cache
//! never holds more than `budget_bytes` of payload at once.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use std::num::NonZeroUsize;

/// Default local tier budget: 1 GiB.
pub const DEFAULT_BUDGET_BYTES: u64 = 1024 * 1024 * 1024;

struct Inner {
    entries: LruCache<String, Bytes>,
    bytes_used: u64,
}

/// Thread-safe, byte-budgeted LRU cache of raw JSON payloads.
pub struct LocalCache {
    inner: Mutex<Inner>,
    budget_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCache {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            // Capacity here just bounds the hashmap's slot count; the real
            // invariant (total bytes <= budget) is enforced in `insert`.
            // Capacity is effectively unbounded by entry count -- eviction
            // is governed entirely by `bytes_used` vs `budget_bytes` below,
            // not by how many entries `LruCache` itself would allow.
            inner: Mutex::new(Inner {
                entries: LruCache::new(NonZeroUsize::new(usize::MAX).unwrap()),
                bytes_used: 0,
            }),
            budget_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        let found = inner.entries.get(key).cloned();
        drop(inner);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("rdap_cache_local_hits_total").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("rdap_cache_local_misses_total").increment(1);
        }
        found
    }

    pub fn set(&self, key: String, value: Bytes) {
        let incoming_len = value.len() as u64;
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.peek(&key) {
            inner.bytes_used = inner.bytes_used.saturating_sub(old.len() as u64);
        }

        while inner.bytes_used + incoming_len > self.budget_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.bytes_used = inner.bytes_used.saturating_sub(evicted.len() as u64);
                    metrics::counter!("rdap_cache_local_evictions_total").increment(1);
                }
                None => break, // single entry larger than the whole budget
            }
        }

        inner.bytes_used += incoming_len;
        inner.entries.put(key, value);
    }

    pub fn del(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(removed) = inner.entries.pop(key) {
            inner.bytes_used = inner.bytes_used.saturating_sub(removed.len() as u64);
        }
    }

    pub fn bytes_used(&self) -> u64 {
        self.inner.lock().bytes_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cache = LocalCache::new(DEFAULT_BUDGET_BYTES);
        cache.set("ip:8.8.8.8".into(), Bytes::from_static(b"{}"));
        assert_eq!(cache.get("ip:8.8.8.8").unwrap(), Bytes::from_static(b"{}"));
        assert!(cache.get("ip:1.1.1.1").is_none());
    }

    #[test]
    fn evicts_when_budget_exceeded() {
        let cache = LocalCache::new(10);
        cache.set("a".into(), Bytes::from_static(b"12345")); // 5 bytes
        cache.set("b".into(), Bytes::from_static(b"12345")); // 5 bytes, total 10
        assert!(cache.bytes_used() <= 10);
        cache.set("c".into(), Bytes::from_static(b"12345")); // forces eviction of "a"
        assert!(cache.bytes_used() <= 10);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn delete_removes_entry_and_bytes() {
        let cache = LocalCache::new(DEFAULT_BUDGET_BYTES);
        cache.set("k".into(), Bytes::from_static(b"hello"));
        cache.del("k");
        assert!(cache.get("k").is_none());
        assert_eq!(cache.bytes_used(), 0);
    }
}
