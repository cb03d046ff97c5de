// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-request trace ID injection.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// A request-scoped trace ID, threaded through `axum`'s extension map so
/// handlers can attach it to error responses and audit events.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

pub async fn inject_trace_id(mut request: Request, next: Next) -> Response {
    let inbound = request
        .headers()
        .get("X-Trace-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let trace_id = TraceId(inbound.unwrap_or_else(|| Uuid::new_v4().to_string()));
    request.extensions_mut().insert(trace_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id.0) {
        response.headers_mut().insert("X-Trace-ID", value);
    }
    response
}
