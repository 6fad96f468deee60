use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::EnrollmentId;

use crate::middleware::auth::{
    RequireEnrollmentsCreate, RequireEnrollmentsRead, RequireEnrollmentsUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_student_access, list_scope, resource_scope, restrict_student_filter,
};
use crate::validator::ValidatedJson;

use super::model::{
    CompleteEnrollmentDto, CreateEnrollmentDto, Enrollment, EnrollmentFilterParams,
    PaginatedEnrollments,
};
use super::service::EnrollmentService;

/// Students may only enroll themselves.
pub async fn create_enrollment(
    State(state): State<AppState>,
    RequireEnrollmentsCreate(auth_user): RequireEnrollmentsCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateEnrollmentDto>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    ensure_student_access(&state.db, &auth_user, dto.student_id).await?;
    let scope = resource_scope(&auth_user)?;
    let enrollment = EnrollmentService::enroll(&state.db, state.cache(), scope, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(
            &auth_user,
            &headers,
            AuditAction::Enroll,
            "enrollment",
            enrollment.id,
        )
        .new_values(&enrollment),
    )
    .await;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn get_enrollments(
    State(state): State<AppState>,
    RequireEnrollmentsRead(auth_user): RequireEnrollmentsRead,
    filters: Result<Query<EnrollmentFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedEnrollments>, AppError> {
    let Query(mut filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;
    filters.student_id = restrict_student_filter(&state.db, &auth_user, filters.student_id).await?;

    let enrollments = EnrollmentService::list(&state.db, scope, filters).await?;
    Ok(Json(enrollments))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    RequireEnrollmentsRead(auth_user): RequireEnrollmentsRead,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = EnrollmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ensure_student_access(&state.db, &auth_user, enrollment.student_id).await?;
    Ok(Json(enrollment))
}

/// Students drop their own enrollments; admins any in their school.
pub async fn drop_enrollment(
    State(state): State<AppState>,
    RequireEnrollmentsCreate(auth_user): RequireEnrollmentsCreate,
    headers: HeaderMap,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<Enrollment>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = EnrollmentService::get(&state.db, scope, id).await?;
    ensure_student_access(&state.db, &auth_user, before.student_id).await?;

    let enrollment = EnrollmentService::drop(&state.db, state.cache(), scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Drop, "enrollment", id)
            .old(&before)
            .new_values(&enrollment),
    )
    .await;
    Ok(Json(enrollment))
}

pub async fn complete_enrollment(
    State(state): State<AppState>,
    RequireEnrollmentsUpdate(auth_user): RequireEnrollmentsUpdate,
    headers: HeaderMap,
    Path(id): Path<EnrollmentId>,
    ValidatedJson(dto): ValidatedJson<CompleteEnrollmentDto>,
) -> Result<Json<Enrollment>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = EnrollmentService::get(&state.db, scope, id).await?;
    let enrollment =
        EnrollmentService::complete(&state.db, state.cache(), scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Complete, "enrollment", id)
            .old(&before)
            .new_values(&enrollment),
    )
    .await;
    Ok(Json(enrollment))
}
