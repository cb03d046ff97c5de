// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fire-and-forget audit event emission to the message bus.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::error::GatewayError;
use crate::model::AuditEvent;

/// Default bounded queue depth before the emitter starts dropping the
/// oldest queued event, applied once the emitter's own breaker is open.
pub const DEFAULT_QUEUE_DEPTH: usize = 10_000;

/// Where serialized audit events ultimately go. Implemented by
/// `KafkaEventSink` in the gateway binary (kept as a trait here so the
/// core never depends on a concrete bus transport) and by an in-memory
/// fake for tests.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, topic: &str, partition_key: &str, payload: Vec<u8>) -> Result<(), GatewayError>;
}

struct Shared {
    queue: Mutex<VecDeque<AuditEvent>>,
    notify: Notify,
    dropped: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
}

/// Non-blocking audit event publisher with its own circuit breaker
/// against the bus, so a stalled bus never backs up request handling.
pub struct EventEmitter {
    shared: Arc<Shared>,
    topic: String,
    capacity: usize,
}

impl EventEmitter {
    /// Spawns the background drain task against `sink`. `emit` itself
    /// never touches `sink` directly.
    pub fn spawn(sink: Arc<dyn EventSink>, topic: impl Into<String>, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));

        let drain_shared = shared.clone();
        let topic_owned = topic.into();
        tokio::spawn(async move {
            loop {
                drain_shared.notify.notified().await;
                loop {
                    let next = { drain_shared.queue.lock().pop_front() };
                    let Some(event) = next else { break };
                    let payload = match serde_json::to_vec(&event) {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize audit event");
                            continue;
                        }
                    };
                    let sink = sink.clone();
                    let topic = topic_owned.clone();
                    let key = event.kind.to_string();
                    let result = breaker
                        .call(|| async move { sink.publish(&topic, &key, payload).await })
                        .await;
                    match result {
                        Ok(()) => {
                            drain_shared.published.fetch_add(1, Ordering::Relaxed);
                            metrics::counter!("rdap_events_published_total").increment(1);
                        }
                        Err(err) => {
                            drain_shared.failed.fetch_add(1, Ordering::Relaxed);
                            metrics::counter!("rdap_events_failed_total").increment(1);
                            warn!(error = %err, "audit event publish failed");
                        }
                    }
                }
            }
        });

        Self {
            shared,
            topic: topic_owned,
            capacity,
        }
    }

    /// Enqueue `event` for publication. Returns immediately; never
    /// propagates a failure to the caller.
    pub fn emit(&self, event: AuditEvent) {
        let mut queue = self.shared.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("rdap_events_dropped_total").increment(1);
        }
        queue.push_back(event);
        drop(queue);
        self.shared.notify.notify_one();
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.shared.published.load(Ordering::Relaxed),
            self.shared.failed.load(Ordering::Relaxed),
            self.shared.dropped.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify as TestNotify;

    #[derive(Default)]
    pub struct RecordingSink {
        pub received: Mutex<Vec<(String, String, Vec<u8>)>>,
        pub count: AtomicUsize,
        pub notify: TestNotify,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), GatewayError> {
            self.received.lock().push((topic.to_string(), key.to_string(), payload));
            self.count.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_waiters();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::RecordingSink;
    use super::*;
    use crate::model::ObjectKind;

    #[tokio::test]
    async fn emit_is_published_asynchronously() {
        let sink = Arc::new(RecordingSink::default());
        let emitter = EventEmitter::spawn(sink.clone(), "rdap-queries", DEFAULT_QUEUE_DEPTH);

        emitter.emit(AuditEvent::new(ObjectKind::Domain, "example.com", "https://rdap.verisign.com/", true));

        tokio::time::timeout(Duration::from_secs(1), sink.notify.notified())
            .await
            .expect("event should be published");
        assert_eq!(sink.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_oldest_when_queue_is_full() {
        // Build the emitter without spawning the drain loop's consumer
        // racing us: use a capacity-2 queue and push 3 synchronously.
        let shared = Shared {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        };
        let emitter = EventEmitter {
            shared: Arc::new(shared),
            topic: "rdap-queries".into(),
            capacity: 2,
        };
        emitter.emit(AuditEvent::new(ObjectKind::Ip, "1.1.1.1", "x", false));
        emitter.emit(AuditEvent::new(ObjectKind::Ip, "2.2.2.2", "x", false));
        emitter.emit(AuditEvent::new(ObjectKind::Ip, "3.3.3.3", "x", false));

        let queue = emitter.shared.queue.lock();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front().unwrap().query, "2.2.2.2");
        assert_eq!(emitter.shared.dropped.load(Ordering::Relaxed), 1);
    }
}
