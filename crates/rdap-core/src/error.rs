// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The error taxonomy shared by every component.
//!
//! Every fallible operation in this crate resolves to a [`GatewayError`]
//! variant. The HTTP frontend (in the `rdap-gateway` binary crate) maps
//! these onto status codes and the `{errorCode, title, description[],
//! trace_id}` response envelope; this crate never depends on HTTP types.

use thiserror::Error;

/// Taxonomy of failures a query resolution can end in.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Client-caused, not retryable.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No upstream matched the input, or the upstream itself returned 404.
    #[error("no authoritative server found for this query")]
    NotFound,

    /// The caller exceeded its rate-limit budget.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: u64,
    },

    /// Upstream responded, but with a non-2xx status.
    #[error("upstream returned status {code}")]
    UpstreamStatus {
        /// The HTTP status code the upstream server returned.
        code: u16,
        /// The upstream response body, if any, forwarded for diagnostics.
        body: String,
    },

    /// The circuit breaker for this upstream is open; the call was never made.
    #[error("circuit open for upstream")]
    CircuitOpen,

    /// Transport-level failure: DNS, TCP connect, TLS, or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else: bugs, poisoned locks, unexpected invariant violations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether a retry of the same upstream call is ever worth attempting:
    /// `Network` always is; `UpstreamStatus` only for the classic transient
    /// 5xx codes. Consulted by `service::fetch_from_upstream`'s bounded
    /// retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::UpstreamStatus { code, .. } => {
                matches!(code, 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Whether this failure should count against a circuit breaker.
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_) | GatewayError::UpstreamStatus { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            GatewayError::Network(err.to_string())
        } else {
            GatewayError::Internal(err.to_string())
        }
    }
}
