//! Client identification
//!
//! The service never stores client addresses, only a salted SHA-256 hash
//! used to debounce repeat visits.

use axum::http::HeaderMap;
use ring::digest::{digest, SHA256};
use std::fmt::Write;
use std::net::SocketAddr;

/// Client address: first `X-Forwarded-For` entry, else the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Hex SHA-256 of `<ip>_<salt>`
pub fn hash_ip(ip: &str, salt: &str) -> String {
    let hash = digest(&SHA256, format!("{}_{}", ip, salt).as_bytes());
    hash.as_ref()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer = "127.0.0.1:4000".parse().ok();
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn test_peer_address_fallback() {
        let peer = "192.0.2.1:5555".parse().ok();
        assert_eq!(client_ip(&HeaderMap::new(), peer), "192.0.2.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_hash_is_salted_hex() {
        let a = hash_ip("192.0.2.1", "salt-a");
        let b = hash_ip("192.0.2.1", "salt-b");
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(a, hash_ip("192.0.2.1", "salt-a"));
    }
}
