// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-flight coalescing: collapse concurrent identical fetches into
//! one execution shared by all waiters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;

/// Coalescer-wide backstop if the caller doesn't supply a tighter
/// deadline.
pub const DEFAULT_BACKSTOP: Duration = Duration::from_secs(30);

/// A waiter's deadline elapsed before the leader produced a result. The
/// leader's fetch is *not* canceled by this.
#[derive(Debug, Clone, thiserror::Error)]
#[error("coalescer wait timed out")]
pub struct CoalesceTimeout;

type Slot<T, E> = Arc<watch::Sender<Option<Result<T, E>>>>;

/// Deduplicates concurrent callers of `do_call` sharing the same key.
pub struct Coalescer<T, E> {
    in_flight: DashMap<String, Slot<T, E>>,
    backstop: Duration,
}

impl<T, E> Default for Coalescer<T, E> {
    fn default() -> Self {
        Self::new(DEFAULT_BACKSTOP)
    }
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(backstop: Duration) -> Self {
        Self {
            in_flight: DashMap::new(),
            backstop,
        }
    }

    /// Number of keys currently in flight (observability / tests only).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Run `fetch` for `key`, or wait for another in-flight call for the
    /// same key to complete. All waiters observe exactly the same result
    /// the leader produced.
    pub async fn do_call<F, Fut>(
        &self,
        key: &str,
        caller_deadline: Option<Duration>,
        fetch: F,
    ) -> Result<Result<T, E>, CoalesceTimeout>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // Insert-or-join must be one atomic region so the in-flight map
        // never has more than one entry for `key` at a time.
        let (is_leader, slot) = match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => (false, e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let (tx, _rx) = watch::channel(None);
                let slot = Arc::new(tx);
                e.insert(slot.clone());
                (true, slot)
            }
        };

        if is_leader {
            let result = fetch().await;
            let _ = slot.send(Some(result.clone()));
            // Only the leader removes its own slot, and only if nobody's
            // raced a brand new round in under this key (can't happen
            // since the leader holds the only reference used to create
            // it, but the ptr_eq guards against future refactors).
            if let Some(existing) = self.in_flight.get(key) {
                if Arc::ptr_eq(&existing, &slot) {
                    drop(existing);
                    self.in_flight.remove(key);
                }
            }
            return Ok(result);
        }

        let mut rx = slot.subscribe();
        if let Some(ready) = rx.borrow().clone() {
            return Ok(ready);
        }

        let wait_for = match caller_deadline {
            Some(d) => d.min(self.backstop),
            None => self.backstop,
        };

        match tokio::time::timeout(wait_for, rx.changed()).await {
            Ok(Ok(())) => rx.borrow().clone().ok_or(CoalesceTimeout),
            Ok(Err(_)) => Err(CoalesceTimeout), // sender dropped without sending
            Err(_) => Err(CoalesceTimeout),     // deadline elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let coalescer: Arc<Coalescer<String, String>> = Arc::new(Coalescer::default());
        let fetch_count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let coalescer = coalescer.clone();
            let fetch_count = fetch_count.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .do_call("domain:example.com", None, || async {
                        fetch_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>("response-body".to_string())
                    })
                    .await
                    .unwrap()
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }

        assert_eq!(fetch_count.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == "response-body"));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn waiter_timeout_does_not_affect_leader_result() {
        let coalescer: Arc<Coalescer<u32, String>> = Arc::new(Coalescer::default());

        let leader = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .do_call("asn:15169", None, || async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            })
        };

        // Give the leader time to register itself.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = coalescer
            .do_call("asn:15169", Some(Duration::from_millis(10)), || async {
                unreachable!("waiter must not become leader")
            })
            .await;
        assert!(waiter.is_err());

        let leader_result = leader.await.unwrap().unwrap().unwrap();
        assert_eq!(leader_result, 42);
    }

    #[tokio::test]
    async fn sequential_calls_each_fetch_again() {
        let coalescer: Coalescer<u32, String> = Coalescer::default();
        let count = AtomicUsize::new(0);

        for _ in 0..3 {
            coalescer
                .do_call("ip:1.1.1.1", None, || async {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(1)
                })
                .await
                .unwrap()
                .unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
