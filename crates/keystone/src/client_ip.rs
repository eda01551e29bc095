//! Client address resolution behind Cloudflare / reverse proxies.

use axum::http::HeaderMap;
use std::net::SocketAddr;

use keystone_common::constants::headers as names;

/// Resolve the caller's IP.
///
/// `CF-Connecting-IP` wins, then the first `X-Forwarded-For` entry, then the
/// socket peer. Blank values are skipped.
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header(names::CF_CONNECTING_IP) {
        return Some(ip.to_string());
    }

    if let Some(first) = header(names::X_FORWARDED_FOR)
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }

    peer.map(|addr| addr.ip().to_string())
}
