mod common;

use axum::http::StatusCode;
use common::{app, lazy_pool, request_forwarded, request_from, test_state, with_rate_limit};
use schoolhub_config::RateLimitConfig;
use serde_json::json;
use tower::ServiceExt;

fn strict() -> RateLimitConfig {
    RateLimitConfig {
        enabled: true,
        general_per_second: 1,
        general_burst_size: 2,
        auth_per_second: 1,
        auth_burst_size: 1,
        ..RateLimitConfig::default()
    }
}

fn login_body() -> Option<serde_json::Value> {
    Some(json!({ "email": "not-an-email", "password": "password123" }))
}

#[tokio::test]
async fn test_auth_bucket_answers_429_once_spent() {
    let app = app(with_rate_limit(test_state(lazy_pool()), strict()));

    let first = app
        .clone()
        .oneshot(request_from("192.0.2.10", "POST", "/api/v1/auth/login", None, login_body()))
        .await
        .unwrap();
    // processed, just invalid
    assert_eq!(first.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let second = app
        .oneshot(request_from("192.0.2.10", "POST", "/api/v1/auth/login", None, login_body()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_buckets_are_per_client() {
    let app = app(with_rate_limit(test_state(lazy_pool()), strict()));

    for ip in ["192.0.2.20", "192.0.2.21", "192.0.2.22"] {
        let response = app
            .clone()
            .oneshot(request_from(ip, "POST", "/api/v1/auth/login", None, login_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn test_general_bucket_covers_api_routes() {
    let app = app(with_rate_limit(test_state(lazy_pool()), strict()));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request_from("192.0.2.30", "GET", "/api/v1/students", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .oneshot(request_from("192.0.2.30", "GET", "/api/v1/courses", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = app(with_rate_limit(test_state(lazy_pool()), strict()));

    for _ in 0..4 {
        let response = app
            .clone()
            .oneshot(request_from("192.0.2.40", "GET", "/health", None, None))
            .await
            .unwrap();
        // no database behind the lazy pool
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

#[tokio::test]
async fn test_disabled_limiter_never_rejects() {
    let config = RateLimitConfig {
        enabled: false,
        ..strict()
    };
    let app = app(with_rate_limit(test_state(lazy_pool()), config));

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(request_from("192.0.2.50", "POST", "/api/v1/auth/login", None, login_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn test_rotating_forwarded_for_shares_the_peer_bucket() {
    let app = app(with_rate_limit(test_state(lazy_pool()), strict()));

    let first = app
        .clone()
        .oneshot(request_forwarded("192.0.2.60", "203.0.113.1", "POST", "/api/v1/auth/login", login_body()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::UNPROCESSABLE_ENTITY);

    for i in 2..12 {
        let forwarded = format!("203.0.113.{i}");
        let response = app
            .clone()
            .oneshot(request_forwarded("192.0.2.60", &forwarded, "POST", "/api/v1/auth/login", login_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

#[tokio::test]
async fn test_trusted_proxy_keys_on_forwarded_client() {
    let config = RateLimitConfig {
        trust_proxy_headers: true,
        ..strict()
    };
    let app = app(with_rate_limit(test_state(lazy_pool()), config));

    // one proxy, distinct clients behind it
    for client in ["203.0.113.70", "203.0.113.71"] {
        let response = app
            .clone()
            .oneshot(request_forwarded("10.0.0.1", client, "POST", "/api/v1/auth/login", login_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    let repeat = app
        .oneshot(request_forwarded("10.0.0.1", "203.0.113.70", "POST", "/api/v1/auth/login", login_body()))
        .await
        .unwrap();
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}
