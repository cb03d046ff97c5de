// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Syntactic validation and canonicalization for the three input kinds.
//!
//! Each function is total: it either returns the canonical form or a
//! human-readable reason the HTTP frontend can surface as a `400` with a
//! suggestion field. None of these functions perform I/O.

use std::net::IpAddr;

use crate::error::GatewayError;

/// Canonicalize and validate a domain name.
///
/// Rules: non-empty, <= 255 bytes, `([label].)+[tld]` where
/// `label` is 1-63 bytes of `[A-Za-z0-9](-?[A-Za-z0-9])*` and `tld` is
/// `[A-Za-z]{2,}`. The canonical form is lowercased ASCII with any trailing
/// dot stripped.
pub fn validate_domain(input: &str) -> Result<String, GatewayError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Validation("domain cannot be empty".into()));
    }

    let without_trailing_dot = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if without_trailing_dot.len() > 255 {
        return Err(GatewayError::Validation("domain name too long".into()));
    }

    let lowered = without_trailing_dot.to_ascii_lowercase();
    let labels: Vec<&str> = lowered.split('.').collect();

    if labels.len() < 2 {
        return Err(GatewayError::Validation(
            "domain must contain at least one dot".into(),
        ));
    }

    let (tld, rest) = labels.split_last().expect("checked len >= 2");

    if tld.len() < 2 || !tld.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(GatewayError::Validation(
            "top-level domain must be at least two letters".into(),
        ));
    }

    for label in rest {
        if !is_valid_label(label) {
            return Err(GatewayError::Validation(format!(
                "invalid label {label:?} in domain"
            )));
        }
    }

    Ok(lowered)
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let bytes = label.as_bytes();
    let first_last_ok = bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();
    let body_ok = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'-');
    first_last_ok && body_ok
}

/// Canonicalize and validate an IPv4 or IPv6 address.
///
/// The canonical form is dotted-decimal for IPv4 and RFC 5952 compressed
/// form for IPv6 -- exactly what `std::net::IpAddr`'s `Display` produces.
pub fn validate_ip(input: &str) -> Result<IpAddr, GatewayError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Validation("IP cannot be empty".into()));
    }
    trimmed
        .parse::<IpAddr>()
        .map_err(|_| GatewayError::Validation(format!("invalid IP address: {trimmed:?}")))
}

/// Canonicalize and validate an ASN.
///
/// Accepts an optional case-insensitive `AS` prefix followed by decimal
/// digits fitting a `u32`. `strict` rejects ASN 0 (reserved).
pub fn validate_asn(input: &str, strict: bool) -> Result<u32, GatewayError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Validation("ASN cannot be empty".into()));
    }

    let digits = if trimmed.len() >= 2 && trimmed[..2].eq_ignore_ascii_case("as") {
        &trimmed[2..]
    } else {
        trimmed
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::Validation(format!(
            "invalid ASN format: {trimmed:?}"
        )));
    }

    let n: u32 = digits
        .parse()
        .map_err(|_| GatewayError::Validation(format!("ASN out of range: {trimmed:?}")))?;

    if strict && n == 0 {
        return Err(GatewayError::Validation("ASN 0 is reserved".into()));
    }

    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_canonicalizes_case_and_trailing_dot() {
        assert_eq!(validate_domain("Example.COM.").unwrap(), "example.com");
    }

    #[test]
    fn domain_idempotent() {
        let once = validate_domain("Example.COM.").unwrap();
        let twice = validate_domain(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn domain_rejects_single_label() {
        assert!(validate_domain("localhost").is_err());
    }

    #[test]
    fn domain_accepts_multi_label_zone() {
        assert_eq!(validate_domain("example.co.uk").unwrap(), "example.co.uk");
    }

    #[test]
    fn domain_rejects_too_long() {
        let long_label = "a".repeat(64);
        let input = format!("{long_label}.com");
        assert!(validate_domain(&input).is_err());
    }

    #[test]
    fn ip_v4_canonical() {
        let ip = validate_ip("008.008.008.008").ok();
        // Leading zeros are not valid dotted-decimal; std rejects them.
        assert!(ip.is_none());
        assert_eq!(validate_ip("8.8.8.8").unwrap().to_string(), "8.8.8.8");
    }

    #[test]
    fn ip_v6_compressed_form() {
        let ip = validate_ip("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(ip.to_string(), "2001:db8::1");
    }

    #[test]
    fn asn_strips_prefix_case_insensitively() {
        assert_eq!(validate_asn("as15169", false).unwrap(), 15169);
        assert_eq!(validate_asn("AS15169", false).unwrap(), 15169);
        assert_eq!(validate_asn("15169", false).unwrap(), 15169);
    }

    #[test]
    fn asn_strict_rejects_zero() {
        assert!(validate_asn("0", true).is_err());
        assert!(validate_asn("0", false).is_ok());
    }

    #[test]
    fn asn_rejects_garbage() {
        assert!(validate_asn("ASxyz", false).is_err());
    }
}
