// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route definitions for the RDAP surface.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ip/:query", get(handlers::lookup_ip))
        .route("/domain/:query", get(handlers::lookup_domain))
        .route("/autnum/:query", get(handlers::lookup_autnum))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
}
