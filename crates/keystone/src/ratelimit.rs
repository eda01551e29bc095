//! Per-client fixed-window rate limiting for `/api/`.

use anyhow::Result;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use keystone_common::constants::{headers as names, messages};

use crate::client_ip;
use crate::routes::json_error;
use crate::state::AppState;
use crate::store::RequestCounter;

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_secs: u64,
    pub window_secs: u64,
}

impl RateDecision {
    /// `RateLimit-*` headers, plus `Retry-After` when refused
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        let mut set = |name: &str, value: String| {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.insert(name, value);
            }
        };

        set(
            names::RATELIMIT_POLICY,
            format!("{};w={}", self.limit, self.window_secs),
        );
        set(names::RATELIMIT_LIMIT, self.limit.to_string());
        set(names::RATELIMIT_REMAINING, self.remaining.to_string());
        set(names::RATELIMIT_RESET, self.reset_secs.to_string());
        if !self.allowed {
            set(header::RETRY_AFTER.as_str(), self.reset_secs.to_string());
        }
    }
}

pub struct RateLimiter {
    counter: Arc<dyn RequestCounter>,
    max_requests: u64,
    window_secs: u64,
    /// Key on `CF-Connecting-IP` / `X-Forwarded-For` instead of the peer
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(counter: Arc<dyn RequestCounter>, max_requests: u64, window_secs: u64) -> Self {
        Self {
            counter,
            max_requests,
            window_secs,
            trust_proxy_headers: false,
        }
    }

    /// Only enable when every request arrives through a proxy that
    /// overwrites these headers; otherwise clients can pick their own key.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Counter key for a request
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let client = if self.trust_proxy_headers {
            client_ip::resolve(headers, peer)
        } else {
            peer.map(|addr| addr.ip().to_string())
        };
        client.unwrap_or_else(|| "unknown".to_string())
    }

    /// Count a request from `client` and decide whether it may proceed
    pub async fn check(&self, client: &str) -> Result<RateDecision> {
        let hit = self.counter.hit(client, self.window_secs).await?;
        let allowed = hit.count <= self.max_requests;

        Ok(RateDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(hit.count),
            reset_secs: hit.reset_secs,
            window_secs: self.window_secs,
        })
    }
}

/// Middleware: refuse with 429 once a client exceeds its window
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(limiter) = state.rate_limiter.clone() else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = limiter.client_key(request.headers(), peer);

    let decision = match limiter.check(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            // Counter backend down: let traffic through
            tracing::warn!(error = %e, "Rate limit check failed");
            return next.run(request).await;
        }
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::info!(client = %client, "Rate limit exceeded");
        json_error(StatusCode::TOO_MANY_REQUESTS, messages::TOO_MANY_REQUESTS).into_response()
    };

    decision.write_headers(response.headers_mut());
    response
}
