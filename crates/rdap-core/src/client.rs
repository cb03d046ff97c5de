// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upstream RDAP fetch: a thin HTTP client speaking `application/rdap+json`
//! to whichever authoritative server `bootstrap` resolved.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::error::GatewayError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const RDAP_MEDIA_TYPE: &str = "application/rdap+json";

/// One fetch of a single RDAP resource from an upstream server. Abstracted
/// behind a trait so the coalescer and circuit breaker can be exercised
/// against a scripted fake instead of a live network call.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// `base_url` is the server bootstrap resolved; `path` is the
    /// RDAP-relative path (e.g. `domain/example.com`).
    async fn fetch(&self, base_url: &str, path: &str) -> Result<(Bytes, String), GatewayError>;
}

/// `reqwest`-backed implementation. One `reqwest::Client` is shared across
/// all upstreams; connection pooling is per-host already, so there is no
/// need to keep one client per registry entry.
pub struct HttpUpstreamClient {
    http: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Internal(err.to_string()))?;
        Ok(Self { http })
    }
}

impl Default for HttpUpstreamClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT).expect("default reqwest client configuration is always valid")
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch(&self, base_url: &str, path: &str) -> Result<(Bytes, String), GatewayError> {
        let url = format!("{}{}", base_url, path.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, RDAP_MEDIA_TYPE)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(RDAP_MEDIA_TYPE)
            .to_string();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UpstreamStatus {
                code: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        Ok((body, content_type))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted responses keyed by call order; panics if exhausted.
    pub struct ScriptedClient {
        responses: Mutex<Vec<Result<(Bytes, String), GatewayError>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedClient {
        pub fn new(responses: Vec<Result<(Bytes, String), GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UpstreamClient for ScriptedClient {
        async fn fetch(&self, _base_url: &str, _path: &str) -> Result<(Bytes, String), GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("ScriptedClient exhausted");
            }
            responses.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::ScriptedClient;
    use super::*;

    #[tokio::test]
    async fn scripted_client_returns_in_order() {
        let client = ScriptedClient::new(vec![
            Ok((Bytes::from_static(b"{\"a\":1}"), "application/rdap+json".into())),
            Err(GatewayError::NotFound),
        ]);

        let (body, content_type) = client.fetch("https://rdap.example/", "domain/example.com").await.unwrap();
        assert_eq!(body, Bytes::from_static(b"{\"a\":1}"));
        assert_eq!(content_type, "application/rdap+json");

        let second = client.fetch("https://rdap.example/", "domain/none.example").await;
        assert!(matches!(second, Err(GatewayError::NotFound)));
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
