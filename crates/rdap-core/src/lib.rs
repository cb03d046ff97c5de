// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core engine for RDAP resolution: bootstrap lookup, two-tier caching,
//! single-flight coalescing, per-upstream circuit breaking, sliding-window
//! rate limiting, and fire-and-forget audit events.
//!
//! This crate has no HTTP dependency; `rdap-gateway` wires it to an axum
//! router.

pub mod bootstrap;
pub mod breaker;
pub mod cache;
pub mod client;
pub mod coalesce;
pub mod error;
pub mod events;
pub mod model;
pub mod ratelimit;
pub mod service;
pub mod validate;

pub use bootstrap::{BootstrapError, BootstrapRegistry};
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitRegistry};
pub use cache::{KvStore, LocalCache, RedisKvStore, RemotePoolConfig, TwoTierCache};
pub use client::{HttpUpstreamClient, UpstreamClient};
pub use coalesce::{CoalesceTimeout, Coalescer};
pub use error::GatewayError;
pub use events::{EventEmitter, EventSink};
pub use model::{AuditEvent, CacheKey, ObjectKind, RdapResponse};
pub use ratelimit::{Admission, RateLimitConfig, RateLimitStore, RateLimiter, RedisRateLimitStore};
pub use service::{GatewayService, ServiceConfig};
