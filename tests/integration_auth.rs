mod common;

use axum::Router;
use axum::http::StatusCode;
use common::{app, body_json, create_test_school, create_test_user, request, test_state};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request("POST", uri, None, Some(body)))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_login_returns_token_pair(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let school = create_test_school(&mut tx).await;
    let user = create_test_user(&mut tx, "teacher", Some(school)).await;
    tx.commit().await.unwrap();
    let app = app(test_state(pool));

    let (status, body) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": user.email, "password": user.password }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["user"]["email"], user.email);
    assert_eq!(body["user"]["role"], "teacher");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_unknown_email_and_wrong_password_look_the_same(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let school = create_test_school(&mut tx).await;
    let user = create_test_user(&mut tx, "student", Some(school)).await;
    tx.commit().await.unwrap();
    let app = app(test_state(pool));

    let (status_a, body_a) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": user.email, "password": "wrong-password" }),
    )
    .await;
    let (status_b, body_b) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "nobody@test.com", "password": "wrong-password" }),
    )
    .await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["error"], body_b["error"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_repeated_failures_lock_the_account(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let school = create_test_school(&mut tx).await;
    let user = create_test_user(&mut tx, "student", Some(school)).await;
    tx.commit().await.unwrap();
    let state = test_state(pool);
    let attempts = state.security_config.max_failed_login_attempts;
    let app = app(state);

    for _ in 0..attempts {
        let (status, _) = post(
            &app,
            "/api/v1/auth/login",
            json!({ "email": user.email, "password": "wrong-password" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // right password, still locked
    let (status, body) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": user.email, "password": user.password }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("locked"), "{body}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_concurrent_failures_still_lock_the_account(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let school = create_test_school(&mut tx).await;
    let user = create_test_user(&mut tx, "student", Some(school)).await;
    tx.commit().await.unwrap();
    let app = app(test_state(pool.clone()));

    let mut attempts = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let app = app.clone();
        let email = user.email.clone();
        attempts.spawn(async move {
            post(
                &app,
                "/api/v1/auth/login",
                json!({ "email": email, "password": "wrong-password" }),
            )
            .await
            .0
        });
    }
    while let Some(status) = attempts.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::UNAUTHORIZED);
    }

    let locked_until = sqlx::query_scalar::<_, Option<chrono::DateTime<chrono::Utc>>>(
        "SELECT locked_until FROM users WHERE id = $1",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(locked_until.is_some_and(|until| until > chrono::Utc::now()));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_disabled_account_is_hidden_without_the_password(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let school = create_test_school(&mut tx).await;
    let user = create_test_user(&mut tx, "teacher", Some(school)).await;
    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let app = app(test_state(pool));

    let (status, body) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": user.email, "password": "wrong-password" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    let (status, body) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": user.email, "password": user.password }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account is disabled");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_refresh_token_rotates_and_rejects_reuse(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let school = create_test_school(&mut tx).await;
    let user = create_test_user(&mut tx, "admin", Some(school)).await;
    tx.commit().await.unwrap();
    let app = app(test_state(pool));

    let (_, login) = post(
        &app,
        "/api/v1/auth/login",
        json!({ "email": user.email, "password": user.password }),
    )
    .await;
    let original = login["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = post(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": original }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{rotated}");
    assert_ne!(rotated["refresh_token"], original.as_str());

    let (status, _) = post(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": original }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // reuse revoked the whole family
    let (status, _) = post(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": rotated["refresh_token"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_forgot_password_does_not_reveal_accounts(pool: PgPool) {
    let app = app(test_state(pool));

    let (status, _) = post(
        &app,
        "/api/v1/auth/forgot-password",
        json!({ "email": "nobody@test.com" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}
