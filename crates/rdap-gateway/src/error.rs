// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Maps [`GatewayError`] onto HTTP status codes and the JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rdap_core::error::GatewayError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorEnvelope {
    #[serde(rename = "errorCode")]
    error_code: u16,
    title: String,
    description: Vec<String>,
}

/// Wraps a [`GatewayError`] with the trace ID of the request that produced
/// it, so handlers can just `?` out of `GatewayError` and still get a
/// correlated response.
pub struct ApiError {
    pub error: GatewayError,
    pub trace_id: String,
}

impl ApiError {
    pub fn new(error: GatewayError, trace_id: String) -> Self {
        Self { error, trace_id }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title) = match &self.error {
            GatewayError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::NotFound => (
                StatusCode::NOT_FOUND,
                "no authoritative server found for this query".to_string(),
            ),
            GatewayError::RateLimited { retry_after_secs } => {
                let status = StatusCode::TOO_MANY_REQUESTS;
                let title = format!("rate limit exceeded, retry after {retry_after_secs}s");
                let body = Json(ErrorEnvelope {
                    error_code: status.as_u16(),
                    title,
                    description: vec![format!("trace_id={}", self.trace_id)],
                });
                let mut response = (status, body).into_response();
                if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert("Retry-After", value);
                }
                return response;
            }
            GatewayError::UpstreamStatus { code, body } => (
                StatusCode::BAD_GATEWAY,
                format!("upstream returned status {code}: {body}"),
            ),
            GatewayError::CircuitOpen => (
                StatusCode::SERVICE_UNAVAILABLE,
                "upstream is temporarily unavailable".to_string(),
            ),
            GatewayError::Network(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            GatewayError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(ErrorEnvelope {
            error_code: status.as_u16(),
            title,
            description: vec![format!("trace_id={}", self.trace_id)],
        });
        (status, body).into_response()
    }
}
