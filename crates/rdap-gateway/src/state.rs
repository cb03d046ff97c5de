// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared application state: the assembled [`GatewayService`] plus the
//! Prometheus handle `/metrics` renders.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use rdap_core::{GatewayService, HttpUpstreamClient, RedisKvStore, RedisRateLimitStore};

pub type Service = GatewayService<RedisKvStore, HttpUpstreamClient, RedisRateLimitStore>;

pub struct AppState {
    pub service: Arc<Service>,
    pub prometheus_handle: PrometheusHandle,
}
