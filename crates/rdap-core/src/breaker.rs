// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-upstream circuit breaker: Closed / Open / HalfOpen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub max_failures: u32,
    pub reset_timeout: Duration,
    pub half_open_quota: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_quota: 5,
        }
    }
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    half_open_in_flight: u32,
    last_transition: Instant,
}

/// One upstream's failure-isolation state machine.
pub struct CircuitBreaker {
    inner: RwLock<Inner>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                half_open_in_flight: 0,
                last_transition: Instant::now(),
            }),
            config,
        }
    }

    pub fn state(&self) -> State {
        self.inner.read().state
    }

    /// Consulted before each upstream call. Handles the `Open` ->
    /// `HalfOpen` transition on probe arrival and the `HalfOpen` admission
    /// quota.
    pub fn allow(&self) -> bool {
        {
            let guard = self.inner.read();
            match guard.state {
                State::Closed => return true,
                State::Open => {
                    if guard.last_transition.elapsed() <= self.config.reset_timeout {
                        return false;
                    }
                    // Past the reset timeout: fall through to admit a probe.
                }
                State::HalfOpen => {}
            }
        }

        let mut guard = self.inner.write();
        match guard.state {
            State::Closed => true,
            State::Open => {
                if guard.last_transition.elapsed() > self.config.reset_timeout {
                    guard.state = State::HalfOpen;
                    guard.half_open_in_flight = 1;
                    guard.last_transition = Instant::now();
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => {
                if guard.half_open_in_flight < self.config.half_open_quota {
                    guard.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Recorded after each upstream call that `allow()` admitted.
    pub fn record(&self, success: bool) {
        let mut guard = self.inner.write();
        match guard.state {
            State::Closed => {
                if success {
                    guard.consecutive_failures = 0;
                } else {
                    guard.consecutive_failures += 1;
                    if guard.consecutive_failures >= self.config.max_failures {
                        guard.state = State::Open;
                        guard.last_transition = Instant::now();
                    }
                }
            }
            State::HalfOpen => {
                guard.half_open_in_flight = guard.half_open_in_flight.saturating_sub(1);
                if success {
                    guard.state = State::Closed;
                    guard.consecutive_failures = 0;
                } else {
                    guard.state = State::Open;
                    guard.consecutive_failures = self.config.max_failures;
                    guard.last_transition = Instant::now();
                }
            }
            State::Open => {
                // A stray result arriving after the state already flipped
                // back to Open under another racer; nothing to update.
            }
        }
    }

    /// Convenience wrapper around the `allow()`/`record(err)` pair: runs
    /// `f` only if the breaker currently admits calls, and records the
    /// outcome using [`GatewayError::counts_as_breaker_failure`].
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>>,
    {
        if !self.allow() {
            metrics::counter!("rdap_breaker_rejections_total").increment(1);
            return Err(GatewayError::CircuitOpen);
        }
        let result = f().await;
        match &result {
            Ok(_) => self.record(true),
            Err(err) if err.counts_as_breaker_failure() => self.record(false),
            Err(_) => self.record(true),
        }
        result
    }
}

/// Per-upstream-URL registry of breakers, created lazily on first use.
#[derive(Default)]
pub struct CircuitRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: BreakerConfig,
}

impl CircuitRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    pub fn get(&self, upstream: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(upstream.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }
}
