// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RDAP Gateway - HTTP frontend over bootstrap lookup, two-tier caching,
//! coalescing, and circuit-broken upstream fetch.
//!
//! # Endpoints
//!
//! - `GET /ip/:query` - IP RDAP lookup
//! - `GET /domain/:query` - domain RDAP lookup
//! - `GET /autnum/:query` - ASN RDAP lookup
//! - `GET /health` - liveness check
//! - `GET /metrics` - Prometheus exposition

mod config;
mod error;
mod handlers;
mod kafka;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use deadpool_redis::{Config as PoolConfig, Runtime};
use metrics_exporter_prometheus::PrometheusBuilder;
use rdap_core::{
    BootstrapRegistry, EventEmitter, GatewayService, HttpUpstreamClient, RedisKvStore,
    RedisRateLimitStore, RemotePoolConfig, ServiceConfig, TwoTierCache,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use config::{Args, RuntimeConfig};
use state::AppState;

/// Bounded worker-pool admission control: an in-flight request beyond this
/// count waits for a permit rather than being admitted unconditionally.
const DEFAULT_MAX_IN_FLIGHT: usize = 5000;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = RuntimeConfig::from_env_and_args(args);

    let filter = config.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(filter).with_target(false).init();

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let state = Arc::new(build_state(&config, prometheus_handle));
    let app = build_router(state);

    let addr: SocketAddr = config.bind_addr.parse().expect("invalid bind address");
    info!("rdap-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("shutdown signal received, draining in-flight requests");
}

fn build_state(config: &RuntimeConfig, prometheus_handle: metrics_exporter_prometheus::PrometheusHandle) -> AppState {
    let bootstrap = Arc::new(
        BootstrapRegistry::load(&config.config_dir).expect("failed to load bootstrap tables"),
    );

    let pool_config = RemotePoolConfig {
        redis_url: config.redis_url.clone(),
        ..Default::default()
    };
    let remote = Arc::new(RedisKvStore::new(&pool_config).expect("failed to build redis pool"));
    let cache = TwoTierCache::new(
        rdap_core::cache::DEFAULT_BUDGET_BYTES,
        remote,
        pool_config.default_ttl,
    );

    let mut redis_cfg = PoolConfig::from_url(&config.redis_url);
    redis_cfg.pool = Some(deadpool_redis::PoolConfig {
        max_size: pool_config.pool_size,
        ..Default::default()
    });
    let redis_pool = redis_cfg
        .create_pool(Some(Runtime::Tokio1))
        .expect("failed to build redis pool for rate limiter");

    let rate_store = RedisRateLimitStore::new(redis_pool, pool_config.io_timeout);
    let upstream = Arc::new(HttpUpstreamClient::default());

    let sink = Arc::new(kafka::KafkaEventSink::new(&config.kafka_brokers).expect("failed to build kafka producer"));
    let events = Arc::new(EventEmitter::spawn(sink, "rdap-queries", rdap_core::events::DEFAULT_QUEUE_DEPTH));

    let service = Arc::new(GatewayService::new(
        bootstrap,
        cache,
        upstream,
        rate_store,
        events,
        ServiceConfig::default(),
    ));

    AppState {
        service,
        prometheus_handle,
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    routes::api_routes()
        .layer(ConcurrencyLimitLayer::new(DEFAULT_MAX_IN_FLIGHT))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::inject_trace_id))
        .with_state(state)
}
