// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ties every component together into one request flow: rate limit,
//! validate, cache, coalesce, resolve, fetch, cache, emit.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, instrument};

use crate::bootstrap::BootstrapRegistry;
use crate::breaker::{BreakerConfig, CircuitRegistry};
use crate::cache::{KvStore, TwoTierCache};
use crate::client::UpstreamClient;
use crate::coalesce::Coalescer;
use crate::error::GatewayError;
use crate::events::EventEmitter;
use crate::model::{AuditEvent, CacheKey, ObjectKind, RdapResponse};
use crate::ratelimit::{Admission, RateLimitConfig, RateLimitStore, RateLimiter};

/// Knobs that aren't tied to any one component's own config type.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub coalesce_backstop: Duration,
    pub cache_ttl: Duration,
    pub breaker: BreakerConfig,
    pub rate_limit: RateLimitConfig,
    /// Base delay for the bounded retry loop around the upstream fetch.
    pub retry_delay: Duration,
    /// Total attempts (including the first) before a retryable error gives up.
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            coalesce_backstop: crate::coalesce::DEFAULT_BACKSTOP,
            cache_ttl: Duration::from_secs(3600),
            breaker: BreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry_delay: Duration::from_millis(100),
            max_retries: 3,
        }
    }
}

/// The assembled request pipeline, generic over the store/client seams so
/// tests can run it entirely against in-memory fakes.
pub struct GatewayService<R: KvStore, U: UpstreamClient, L: RateLimitStore> {
    bootstrap: Arc<BootstrapRegistry>,
    cache: TwoTierCache<R>,
    coalescer: Coalescer<(Bytes, String), GatewayError>,
    breakers: CircuitRegistry,
    upstream: Arc<U>,
    rate_limiter: RateLimiter<L>,
    events: Arc<EventEmitter>,
    retry_delay: Duration,
    max_retries: u32,
}

impl<R: KvStore, U: UpstreamClient, L: RateLimitStore> GatewayService<R, U, L> {
    pub fn new(
        bootstrap: Arc<BootstrapRegistry>,
        cache: TwoTierCache<R>,
        upstream: Arc<U>,
        rate_store: L,
        events: Arc<EventEmitter>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            bootstrap,
            cache,
            coalescer: Coalescer::new(config.coalesce_backstop),
            breakers: CircuitRegistry::new(config.breaker),
            upstream,
            rate_limiter: RateLimiter::new(rate_store, config.rate_limit),
            events,
            retry_delay: config.retry_delay,
            max_retries: config.max_retries,
        }
    }

    /// Resolve one query end to end. `raw_query` is whatever the caller
    /// typed; `client_id` identifies the rate-limit bucket (the caller's
    /// IP, by default).
    #[instrument(skip(self), fields(kind = %kind, query = %raw_query))]
    pub async fn resolve(
        &self,
        kind: ObjectKind,
        raw_query: &str,
        client_id: &str,
        now_ms: i64,
    ) -> Result<RdapResponse, GatewayError> {
        let endpoint_class = endpoint_class(kind);
        match self.rate_limiter.admit(client_id, endpoint_class, now_ms).await? {
            Admission::Allow => {}
            Admission::Deny { retry_after_secs } => {
                return Err(GatewayError::RateLimited { retry_after_secs });
            }
        }

        let canonical = canonicalize(kind, raw_query)?;
        let cache_key = cache_key_for(kind, &canonical);

        if let Some(body) = self.cache.get(cache_key.as_str()).await {
            let response = RdapResponse {
                body,
                content_type: "application/rdap+json".to_string(),
                source: "cache".to_string(),
                cache_hit: true,
            };
            self.events.emit(AuditEvent::new(kind, canonical, "cache", true));
            return Ok(response);
        }

        let path = path_for(kind, &canonical);
        let result = self
            .coalescer
            .do_call(cache_key.as_str(), None, || async {
                self.fetch_from_upstream(kind, &canonical, &path).await
            })
            .await
            .map_err(|_| GatewayError::Internal("coalescer wait timed out".to_string()))?;

        let (body, content_type, source) = match result {
            Ok((body, content_type)) => {
                let base_url = self.bootstrap.resolve(kind, &canonical)?;
                self.cache.set(cache_key.as_str(), body.clone()).await;
                (body, content_type, base_url)
            }
            Err(err) => {
                self.events.emit(AuditEvent::new(kind, canonical, "error", false));
                return Err(err);
            }
        };

        self.events.emit(AuditEvent::new(kind, canonical, source.clone(), false));
        info!(%source, "served from upstream");
        Ok(RdapResponse {
            body,
            content_type,
            source,
            cache_hit: false,
        })
    }

    /// Bounded retry around one upstream fetch: each attempt (including the
    /// first) goes through the circuit breaker, and only
    /// [`GatewayError::is_retryable`] failures are retried, with exponential
    /// backoff starting at `retry_delay`.
    async fn fetch_from_upstream(
        &self,
        kind: ObjectKind,
        canonical: &str,
        path: &str,
    ) -> Result<(Bytes, String), GatewayError> {
        let base_url = self.bootstrap.resolve(kind, canonical)?;
        let breaker = self.breakers.get(&base_url);

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let upstream = self.upstream.clone();
            let call_base = base_url.clone();
            let call_path = path.to_string();
            let result = breaker
                .call(|| async move { upstream.fetch(&call_base, &call_path).await })
                .await;

            match result {
                Ok(ok) => return Ok(ok),
                Err(err) if attempts < self.max_retries && err.is_retryable() => {
                    tokio::time::sleep(self.retry_delay * 2u32.pow(attempts - 1)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn canonicalize(kind: ObjectKind, raw_query: &str) -> Result<String, GatewayError> {
    match kind {
        ObjectKind::Domain => crate::validate::validate_domain(raw_query),
        ObjectKind::Ip => crate::validate::validate_ip(raw_query).map(|addr| addr.to_string()),
        ObjectKind::Asn => crate::validate::validate_asn(raw_query, true).map(|n| n.to_string()),
    }
}

fn cache_key_for(kind: ObjectKind, canonical: &str) -> CacheKey {
    match kind {
        ObjectKind::Domain => CacheKey::domain(canonical),
        ObjectKind::Ip => CacheKey::ip(canonical),
        ObjectKind::Asn => CacheKey::asn(canonical.parse().unwrap_or(0)),
    }
}

fn path_for(kind: ObjectKind, canonical: &str) -> String {
    match kind {
        ObjectKind::Domain => format!("domain/{canonical}"),
        ObjectKind::Ip => format!("ip/{canonical}"),
        ObjectKind::Asn => format!("autnum/{canonical}"),
    }
}

/// RDAP's own path segment for ASNs is `autnum`, not `asn` -- the rate
/// limiter's endpoint classes follow the HTTP surface, not `ObjectKind`.
fn endpoint_class(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Domain => "domain",
        ObjectKind::Ip => "ip",
        ObjectKind::Asn => "autnum",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryKvStore, DEFAULT_BUDGET_BYTES};
    use crate::client::fake::ScriptedClient;
    use crate::events::fake::RecordingSink;
    use crate::ratelimit::InMemoryRateLimitStore;
    use std::io::Write;

    fn bootstrap_dir_with_com() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(content.as_bytes()).unwrap();
        };
        write("ipv4.json", r#"{"services":[]}"#);
        write("ipv6.json", r#"{"services":[]}"#);
        write("asn.json", r#"{"services":[]}"#);
        write(
            "dns.json",
            r#"{"services":[[["com"],["https://rdap.verisign.com/com/v1/"]]]}"#,
        );
        dir
    }

    fn build_service(
        client: ScriptedClient,
    ) -> GatewayService<InMemoryKvStore, ScriptedClient, InMemoryRateLimitStore> {
        let dir = bootstrap_dir_with_com();
        let bootstrap = Arc::new(BootstrapRegistry::load(dir.path()).unwrap());
        let remote = Arc::new(InMemoryKvStore::default());
        let cache = TwoTierCache::new(DEFAULT_BUDGET_BYTES, remote, Duration::from_secs(60));
        let sink = Arc::new(RecordingSink::default());
        let events = Arc::new(EventEmitter::spawn(sink, "rdap-queries", 1024));
        GatewayService::new(
            bootstrap,
            cache,
            Arc::new(client),
            InMemoryRateLimitStore::default(),
            events,
            ServiceConfig::default(),
        )
    }

    #[tokio::test]
    async fn resolves_and_caches_a_domain() {
        let client = ScriptedClient::new(vec![Ok((
            Bytes::from_static(b"{\"objectClassName\":\"domain\"}"),
            "application/rdap+json".to_string(),
        ))]);
        let service = build_service(client);

        let first = service
            .resolve(ObjectKind::Domain, "Example.COM.", "127.0.0.1", 0)
            .await
            .unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.source, "https://rdap.verisign.com/com/v1/");

        let second = service
            .resolve(ObjectKind::Domain, "example.com", "127.0.0.1", 1)
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.body, first.body);
    }

    #[tokio::test]
    async fn unresolvable_domain_is_not_found() {
        let client = ScriptedClient::new(vec![]);
        let service = build_service(client);
        let err = service
            .resolve(ObjectKind::Domain, "example.unregistered-tld", "127.0.0.1", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound));
    }

    #[tokio::test]
    async fn invalid_query_is_rejected_before_any_upstream_call() {
        let client = ScriptedClient::new(vec![]);
        let service = build_service(client);
        let err = service
            .resolve(ObjectKind::Domain, "not a domain", "127.0.0.1", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_rejects_before_cache_or_upstream() {
        let client = ScriptedClient::new(vec![]);
        let mut config = ServiceConfig::default();
        config.rate_limit.default_max = 0;
        let dir = bootstrap_dir_with_com();
        let bootstrap = Arc::new(BootstrapRegistry::load(dir.path()).unwrap());
        let remote = Arc::new(InMemoryKvStore::default());
        let cache = TwoTierCache::new(DEFAULT_BUDGET_BYTES, remote, Duration::from_secs(60));
        let sink = Arc::new(RecordingSink::default());
        let events = Arc::new(EventEmitter::spawn(sink, "rdap-queries", 1024));
        let service = GatewayService::new(
            bootstrap,
            cache,
            Arc::new(client),
            InMemoryRateLimitStore::default(),
            events,
            config,
        );

        let err = service
            .resolve(ObjectKind::Domain, "example.com", "127.0.0.1", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { .. }));
    }
}
