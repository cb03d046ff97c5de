// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP handlers for the RDAP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rdap_core::ObjectKind;
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::TraceId;
use crate::state::AppState;

async fn resolve(
    state: Arc<AppState>,
    kind: ObjectKind,
    query: String,
    client_addr: SocketAddr,
    trace_id: String,
) -> Result<Response, ApiError> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let result = state
        .service
        .resolve(kind, &query, &client_addr.ip().to_string(), now_ms)
        .await
        .map_err(|err| ApiError::new(err, trace_id))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, result.content_type.clone())],
        result.body,
    )
        .into_response())
}

pub async fn lookup_ip(
    State(state): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(query): Path<String>,
) -> Result<Response, ApiError> {
    resolve(state, ObjectKind::Ip, query, addr, trace_id.0).await
}

pub async fn lookup_domain(
    State(state): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(query): Path<String>,
) -> Result<Response, ApiError> {
    resolve(state, ObjectKind::Domain, query, addr, trace_id.0).await
}

pub async fn lookup_autnum(
    State(state): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(query): Path<String>,
) -> Result<Response, ApiError> {
    resolve(state, ObjectKind::Asn, query, addr, trace_id.0).await
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    time: chrono::DateTime<Utc>,
}

/// `GET /health`.
pub async fn health() -> Response {
    (
        StatusCode::OK,
        Json(HealthBody {
            status: "ok",
            time: Utc::now(),
        }),
    )
        .into_response()
}

/// `GET /metrics`: renders the process's Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, state.prometheus_handle.render()).into_response()
}
