//! Per-client token bucket limiting.
//!
//! Clients are keyed by the socket peer address. Forwarded headers are only
//! honored when `RATE_LIMIT_TRUST_PROXY` is set, since any client can send
//! them. Requests over the quota get 429.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use schoolhub_config::KeyedLimiter;
use schoolhub_core::AppError;
use tracing::warn;

use crate::state::AppState;

/// First `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    header("x-forwarded-for").or_else(|| header("x-real-ip"))
}

pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    trust_proxy
        .then(|| forwarded_ip(headers))
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn check(
    limiter: &KeyedLimiter,
    trust_proxy: bool,
    req: &Request,
    scope: &'static str,
) -> Result<(), AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, trust_proxy);

    limiter.check_key(&key).map_err(|_| {
        warn!(client = %key, scope, path = %req.uri().path(), "Rate limit exceeded");
        AppError::too_many_requests("Too many requests, please slow down")
    })
}

pub async fn general_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.rate_limit_config.enabled
        && let Err(e) = check(
            &state.rate_limiters.general,
            state.rate_limit_config.trust_proxy_headers,
            &req,
            "general",
        )
    {
        return e.into_response();
    }
    next.run(req).await
}

/// Stricter bucket for credential endpoints.
pub async fn auth_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.rate_limit_config.enabled
        && let Err(e) = check(
            &state.rate_limiters.auth,
            state.rate_limit_config.trust_proxy_headers,
            &req,
            "auth",
        )
    {
        return e.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        headers
    }

    #[test]
    fn test_peer_is_the_key_by_default() {
        let peer: SocketAddr = "192.0.2.10:5555".parse().unwrap();
        assert_eq!(client_key(&forwarded(), Some(peer), false), "192.0.2.10");
        assert_eq!(client_key(&forwarded(), None, false), "unknown");
    }

    #[test]
    fn test_trusted_proxy_uses_first_forwarded_hop() {
        let peer: SocketAddr = "192.0.2.10:5555".parse().unwrap();
        assert_eq!(client_key(&forwarded(), Some(peer), true), "203.0.113.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_key(&headers, Some(peer), true), "198.51.100.2");
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "192.0.2.10");
    }
}
