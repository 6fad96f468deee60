use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{Json, Router, extract::State, middleware, routing::get};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::logging::logging_middleware;
use crate::metrics::metrics_middleware;
use crate::middleware::rate_limit::general_rate_limit;
use crate::modules::assignments::init_assignments_router;
use crate::modules::attendance::init_attendance_router;
use crate::modules::audit_logs::init_audit_logs_router;
use crate::modules::auth::init_auth_router;
use crate::modules::courses::init_courses_router;
use crate::modules::departments::init_departments_router;
use crate::modules::documents::init_documents_router;
use crate::modules::enrollments::init_enrollments_router;
use crate::modules::grades::init_grades_router;
use crate::modules::mfa::init_mfa_router;
use crate::modules::notifications::{init_notifications_router, notification_hub_handler};
use crate::modules::reports::init_reports_router;
use crate::modules::schedules::init_schedules_router;
use crate::modules::schools::init_schools_router;
use crate::modules::semesters::init_semesters_router;
use crate::modules::settings::init_settings_router;
use crate::modules::students::init_students_router;
use crate::modules::teachers::init_teachers_router;
use crate::modules::users::init_users_router;
use crate::state::AppState;

/// Liveness plus a database round trip. Not rate limited.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up", "cache": state.cache.is_some() })),
        ),
        Err(e) => {
            warn!(error = %e, "Health check database probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}

fn api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", init_auth_router(state.clone()))
        .nest("/mfa", init_mfa_router())
        .nest("/schools", init_schools_router())
        .nest("/users", init_users_router())
        .nest("/departments", init_departments_router())
        .nest("/semesters", init_semesters_router())
        .nest("/students", init_students_router())
        .nest("/teachers", init_teachers_router())
        .nest("/courses", init_courses_router())
        .nest("/enrollments", init_enrollments_router())
        .nest("/grades", init_grades_router())
        .nest("/assignments", init_assignments_router())
        .nest("/attendance", init_attendance_router())
        .nest("/schedules", init_schedules_router())
        .nest("/documents", init_documents_router())
        .nest("/notifications", init_notifications_router())
        .nest("/audit-logs", init_audit_logs_router())
        .nest("/settings", init_settings_router())
        .nest("/reports", init_reports_router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            general_rate_limit,
        ))
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = state
        .cors_config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn init_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/notificationHub", get(notification_hub_handler))
        .nest("/api/v1", api_router(&state))
        .with_state(state.clone())
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}
