// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IANA bootstrap registry: loads `dns.json`, `ipv4.json`, `ipv6.json`, and
//! `asn.json` and answers "who serves X?" by longest/first match.
//!
//! Tables are immutable after load. [`BootstrapRegistry::reload`] builds a
//! brand new table set and atomically swaps the pointer so readers never
//! observe a half-loaded table.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use ipnet::IpNet;
use serde::Deserialize;
use thiserror::Error;

use crate::error::GatewayError;
use crate::model::ObjectKind;

/// The raw shape of an IANA bootstrap JSON document.
///
/// ```json
/// { "description": "...", "publication": "...",
///   "services": [ [ [key, ...], [serverURL, ...] ], ... ] }
/// ```
#[derive(Debug, Deserialize)]
struct RawBootstrapFile {
    #[allow(dead_code)]
    description: Option<String>,
    #[allow(dead_code)]
    publication: Option<String>,
    services: Vec<(Vec<String>, Vec<String>)>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("reading bootstrap file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing bootstrap file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid CIDR {cidr:?} in IP bootstrap table")]
    InvalidCidr { cidr: String },
    #[error("invalid ASN range {range:?} in ASN bootstrap table")]
    InvalidAsnRange { range: String },
}

/// A single key/servers row, after the per-flavor key has been parsed.
struct Entry<K> {
    keys: Vec<K>,
    servers: Vec<String>,
}

enum AsnKey {
    Single(u32),
    Range(u32, u32),
}

/// One fully parsed, immutable snapshot of all three bootstrap tables.
struct Tables {
    dns: Vec<Entry<String>>,
    ip: Vec<Entry<IpNet>>,
    asn: Vec<Entry<AsnKey>>,
}

impl fmt::Debug for Tables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tables")
            .field("dns_entries", &self.dns.len())
            .field("ip_entries", &self.ip.len())
            .field("asn_entries", &self.asn.len())
            .finish()
    }
}

/// Read-mostly, swap-on-reload registry of the three bootstrap tables.
pub struct BootstrapRegistry {
    tables: ArcSwap<Tables>,
}

impl fmt::Debug for BootstrapRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapRegistry")
            .field("tables", &*self.tables.load())
            .finish()
    }
}

impl BootstrapRegistry {
    /// Load all four bootstrap files from `dir` (`dns.json`, `ipv4.json`,
    /// `ipv6.json`, `asn.json`).
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let tables = Self::load_tables(dir.as_ref())?;
        Ok(Self {
            tables: ArcSwap::new(Arc::new(tables)),
        })
    }

    /// Re-parse the bootstrap files and atomically swap the live table set.
    /// Existing readers in flight keep using the table snapshot they
    /// already loaded; new callers see the new tables immediately.
    pub fn reload(&self, dir: impl AsRef<Path>) -> Result<(), BootstrapError> {
        let tables = Self::load_tables(dir.as_ref())?;
        self.tables.store(Arc::new(tables));
        Ok(())
    }

    fn load_tables(dir: &Path) -> Result<Tables, BootstrapError> {
        let dns_raw = read_json(&dir.join("dns.json"))?;
        let ipv4_raw = read_json(&dir.join("ipv4.json"))?;
        let ipv6_raw = read_json(&dir.join("ipv6.json"))?;
        let asn_raw = read_json(&dir.join("asn.json"))?;

        let dns = dns_raw
            .services
            .into_iter()
            .map(|(keys, servers)| Entry {
                keys: keys.into_iter().map(|k| k.trim_start_matches('.').to_ascii_lowercase()).collect(),
                servers,
            })
            .collect();

        let mut ip = Vec::new();
        for (keys, servers) in ipv4_raw.services.into_iter().chain(ipv6_raw.services) {
            let parsed_keys = keys
                .iter()
                .map(|k| {
                    k.parse::<IpNet>().map_err(|_| BootstrapError::InvalidCidr {
                        cidr: k.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ip.push(Entry {
                keys: parsed_keys,
                servers,
            });
        }

        let asn = asn_raw
            .services
            .into_iter()
            .map(|(keys, servers)| {
                let parsed_keys = keys
                    .iter()
                    .map(|k| parse_asn_key(k))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Entry {
                    keys: parsed_keys,
                    servers,
                })
            })
            .collect::<Result<Vec<_>, BootstrapError>>()?;

        Ok(Tables { dns, ip, asn })
    }

    /// Resolve `input` (already canonicalized by `validate`) to the base
    /// URL of the authoritative upstream, or [`GatewayError::NotFound`].
    pub fn resolve(&self, kind: ObjectKind, input: &str) -> Result<String, GatewayError> {
        let tables = self.tables.load();
        match kind {
            ObjectKind::Ip => {
                let addr: IpAddr = input
                    .parse()
                    .map_err(|_| GatewayError::Validation(format!("invalid IP: {input:?}")))?;
                resolve_ip(&tables.ip, addr)
            }
            ObjectKind::Asn => {
                let n: u32 = input
                    .parse()
                    .map_err(|_| GatewayError::Validation(format!("invalid ASN: {input:?}")))?;
                resolve_asn(&tables.asn, n)
            }
            ObjectKind::Domain => resolve_domain(&tables.dns, input),
        }
    }
}

fn read_json(path: &Path) -> Result<RawBootstrapFile, BootstrapError> {
    let content = std::fs::read_to_string(path).map_err(|source| BootstrapError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| BootstrapError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn parse_asn_key(key: &str) -> Result<AsnKey, BootstrapError> {
    if let Some((start, end)) = key.split_once('-') {
        let a: u32 = start
            .trim()
            .parse()
            .map_err(|_| BootstrapError::InvalidAsnRange { range: key.into() })?;
        let b: u32 = end
            .trim()
            .parse()
            .map_err(|_| BootstrapError::InvalidAsnRange { range: key.into() })?;
        if a > b {
            return Err(BootstrapError::InvalidAsnRange { range: key.into() });
        }
        Ok(AsnKey::Range(a, b))
    } else {
        let n: u32 = key
            .trim()
            .parse()
            .map_err(|_| BootstrapError::InvalidAsnRange { range: key.into() })?;
        Ok(AsnKey::Single(n))
    }
}

fn resolve_ip(entries: &[Entry<IpNet>], addr: IpAddr) -> Result<String, GatewayError> {
    for entry in entries {
        if entry.keys.iter().any(|cidr| cidr.contains(&addr)) {
            if let Some(server) = entry.servers.first() {
                return Ok(normalize_server(server));
            }
        }
    }
    Err(GatewayError::NotFound)
}

fn resolve_asn(entries: &[Entry<AsnKey>], n: u32) -> Result<String, GatewayError> {
    for entry in entries {
        let matched = entry.keys.iter().any(|key| match key {
            AsnKey::Single(v) => *v == n,
            AsnKey::Range(a, b) => *a <= n && n <= *b,
        });
        if matched {
            if let Some(server) = entry.servers.first() {
                return Ok(normalize_server(server));
            }
        }
    }
    Err(GatewayError::NotFound)
}

/// Rightmost-matching-suffix walk: for `a.b.c.d` try `b.c.d`, then `c.d`,
/// then `d`.
fn resolve_domain(entries: &[Entry<String>], domain: &str) -> Result<String, GatewayError> {
    let labels: Vec<&str> = domain.split('.').collect();
    for start in 0..labels.len() {
        let suffix = labels[start..].join(".");
        for entry in entries {
            if entry.keys.iter().any(|key| key == &suffix) {
                if let Some(server) = entry.servers.first() {
                    return Ok(normalize_server(server));
                }
            }
        }
    }
    Err(GatewayError::NotFound)
}

/// Ensure the returned server has a scheme and a trailing slash.
fn normalize_server(server: &str) -> String {
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{server}")
    };
    if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_bootstrap_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(content.as_bytes()).unwrap();
        };
        write(
            "ipv4.json",
            r#"{"description":"v4","publication":"2024-01-01T00:00:00Z",
               "services":[[["8.0.0.0/8"],["https://rdap.arin.net/registry/"]]]}"#,
        );
        write(
            "ipv6.json",
            r#"{"description":"v6","publication":"2024-01-01T00:00:00Z","services":[]}"#,
        );
        write(
            "asn.json",
            r#"{"description":"asn","publication":"2024-01-01T00:00:00Z",
               "services":[[["15000-16000"],["https://rdap.arin.net/registry/"]]]}"#,
        );
        write(
            "dns.json",
            r#"{"description":"dns","publication":"2024-01-01T00:00:00Z",
               "services":[[["com","net"],["https://rdap.verisign.com/com/v1/"]],
                            [["uk"],["https://rdap.nominet.uk/uk/"]]]}"#,
        );
        dir
    }

    #[test]
    fn ip_resolve_scenario() {
        let dir = write_bootstrap_dir();
        let reg = BootstrapRegistry::load(dir.path()).unwrap();
        let url = reg.resolve(ObjectKind::Ip, "8.8.8.8").unwrap();
        assert_eq!(url, "https://rdap.arin.net/registry/");
    }

    #[test]
    fn asn_range_scenario() {
        let dir = write_bootstrap_dir();
        let reg = BootstrapRegistry::load(dir.path()).unwrap();
        assert_eq!(
            reg.resolve(ObjectKind::Asn, "15169").unwrap(),
            "https://rdap.arin.net/registry/"
        );
        assert!(matches!(
            reg.resolve(ObjectKind::Asn, "20000"),
            Err(GatewayError::NotFound)
        ));
    }

    #[test]
    fn tld_scenario() {
        let dir = write_bootstrap_dir();
        let reg = BootstrapRegistry::load(dir.path()).unwrap();
        assert_eq!(
            reg.resolve(ObjectKind::Domain, "example.com").unwrap(),
            "https://rdap.verisign.com/com/v1/"
        );
        assert!(matches!(
            reg.resolve(ObjectKind::Domain, "example.xyz"),
            Err(GatewayError::NotFound)
        ));
    }

    #[test]
    fn multi_label_zone_uses_rightmost_suffix_walk() {
        let dir = write_bootstrap_dir();
        let reg = BootstrapRegistry::load(dir.path()).unwrap();
        // "co.uk" isn't a key itself, but "uk" is -- the walk must fall
        // back to the rightmost single label.
        assert_eq!(
            reg.resolve(ObjectKind::Domain, "example.co.uk").unwrap(),
            "https://rdap.nominet.uk/uk/"
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        let dir = write_bootstrap_dir();
        let reg = BootstrapRegistry::load(dir.path()).unwrap();
        let a = reg.resolve(ObjectKind::Domain, "example.com").unwrap();
        let b = reg.resolve(ObjectKind::Domain, "example.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reload_swaps_atomically() {
        let dir = write_bootstrap_dir();
        let reg = BootstrapRegistry::load(dir.path()).unwrap();
        assert!(reg.resolve(ObjectKind::Domain, "example.org").is_err());

        let mut f = std::fs::File::create(dir.path().join("dns.json")).unwrap();
        f.write_all(
            br#"{"description":"dns","publication":"2024-01-01T00:00:00Z",
               "services":[[["org"],["https://rdap.pir.org/"]]]}"#,
        )
        .unwrap();
        drop(f);

        reg.reload(dir.path()).unwrap();
        assert_eq!(
            reg.resolve(ObjectKind::Domain, "example.org").unwrap(),
            "https://rdap.pir.org/"
        );
    }
}
