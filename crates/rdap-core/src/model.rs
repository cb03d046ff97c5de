// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared value types that flow between components.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three RDAP object classes the gateway resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Ip,
    Asn,
    Domain,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Ip => write!(f, "ip"),
            ObjectKind::Asn => write!(f, "asn"),
            ObjectKind::Domain => write!(f, "domain"),
        }
    }
}

/// A canonical cache key: `"ip:" | "asn:" | "domain:"` followed by the
/// normalized query value. See `validate` for the normalization rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn ip(normalized_ip: &str) -> Self {
        Self(format!("ip:{normalized_ip}"))
    }

    pub fn asn(n: u32) -> Self {
        Self(format!("asn:{n}"))
    }

    pub fn domain(normalized_domain: &str) -> Self {
        Self(format!("domain:{normalized_domain}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The relayed RDAP+JSON response, plus the bookkeeping the caller needs to
/// populate caches and audit events.
#[derive(Debug, Clone)]
pub struct RdapResponse {
    /// Raw JSON body, exactly as the upstream (or cache) returned it.
    pub body: Bytes,
    /// `Content-Type` to relay to the HTTP client (usually
    /// `application/rdap+json`).
    pub content_type: String,
    /// Base URL of the upstream RDAP server that served this (or cached)
    /// response.
    pub source: String,
    /// Whether this response came from the cache rather than an upstream
    /// fetch.
    pub cache_hit: bool,
}

/// A fire-and-forget audit record describing one handled query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: ObjectKind,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(rename = "cacheHit")]
    pub cache_hit: bool,
}

impl AuditEvent {
    pub fn new(kind: ObjectKind, query: impl Into<String>, source: impl Into<String>, cache_hit: bool) -> Self {
        Self {
            kind,
            query: query.into(),
            timestamp: Utc::now(),
            source: source.into(),
            cache_hit,
        }
    }
}
