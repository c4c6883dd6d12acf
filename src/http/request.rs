//! Request inspection helpers.
//!
//! # Responsibilities
//! - Determine the source IP of an inbound notification
//! - Extract signature and timestamp headers
//!
//! # Design Decisions
//! - `X-Forwarded-For` is ignored unless `trust_forwarded_for` is set
//! - Missing headers become empty strings so the validator reports them

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Source IP for allow-listing and rate limiting.
pub fn source_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Header value as a string, empty when missing or not visible ASCII.
pub fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// All headers with readable values, keyed by lowercase name.
pub fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-webhook-signature", HeaderValue::from_static(" abc "));
        headers
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(source_ip(&headers(), Some(peer), true), "203.0.113.9");
        assert_eq!(source_ip(&headers(), Some(peer), false), "10.0.0.1");
        assert_eq!(source_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.1");
        assert_eq!(source_ip(&HeaderMap::new(), None, false), "unknown");
    }

    #[test]
    fn test_header_extraction() {
        let headers = headers();
        assert_eq!(header_str(&headers, "x-webhook-signature"), "abc");
        assert_eq!(header_str(&headers, "x-webhook-timestamp"), "");
        assert_eq!(header_map(&headers).len(), 2);
    }
}
