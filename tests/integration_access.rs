mod common;

use axum::http::StatusCode;
use common::{body_json, lazy_app, request, token_for};
use schoolhub_config::JwtConfig;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _) = lazy_app();

    let response = app
        .oneshot(request("GET", "/api/v1/students", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let (app, _) = lazy_app();

    let response = app
        .oneshot(request("GET", "/api/v1/courses", Some("not.a.jwt"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_unauthorized() {
    let (app, state) = lazy_app();
    let mut foreign = state.clone();
    foreign.jwt_config = JwtConfig {
        secret: "some-other-secret".to_string(),
        ..state.jwt_config.clone()
    };
    let token = token_for(&foreign, Uuid::new_v4(), "admin", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request("GET", "/api/v1/students", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_cannot_read_audit_logs() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "student", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request("GET", "/api/v1/audit-logs", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Access denied. Missing required permission: audit:read"
    );
}

#[tokio::test]
async fn test_teacher_cannot_create_schools() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "teacher", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/schools",
            Some(&token),
            Some(json!({ "name": "Rogue Academy", "code": "RGA" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_cannot_view_dashboard() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "student", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request("GET", "/api/v1/reports/dashboard", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_cannot_export_rosters() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "student", Some(Uuid::new_v4()));
    let uri = format!("/api/v1/reports/courses/{}/roster/export", Uuid::new_v4());

    let response = app
        .oneshot(request("GET", &uri, Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_school_admin_cannot_write_global_settings() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "admin", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request(
            "PUT",
            "/api/v1/settings/grading.pass_mark?global=true",
            Some(&token),
            Some(json!({ "value": "50" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_setting_key_format_is_rejected() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "admin", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request(
            "PUT",
            "/api/v1/settings/Grading.PassMark",
            Some(&token),
            Some(json!({ "value": "50" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_invalid_email_is_unprocessable() {
    let (app, _) = lazy_app();

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "password123" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_with_missing_field_is_bad_request() {
    let (app, _) = lazy_app();

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "someone@test.com" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_course_validation_runs_before_storage() {
    let (app, state) = lazy_app();
    let token = token_for(&state, Uuid::new_v4(), "admin", Some(Uuid::new_v4()));

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/courses",
            Some(&token),
            Some(json!({
                "code": "CS101",
                "name": "Intro",
                "credit_hours": 12,
                "max_capacity": 0
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = lazy_app();

    let response = app
        .oneshot(request("GET", "/api/v1/nothing-here", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
