use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::{SchoolId, SemesterId};

use crate::middleware::auth::{
    RequireSemestersCreate, RequireSemestersDelete, RequireSemestersRead, RequireSemestersUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{list_scope, resource_scope, scoped_school_id};
use crate::validator::ValidatedJson;

use super::model::{
    CreateSemesterDto, PaginatedSemesters, Semester, SemesterFilterParams, UpdateSemesterDto,
};
use super::service::SemesterService;

pub async fn create_semester(
    State(state): State<AppState>,
    RequireSemestersCreate(auth_user): RequireSemestersCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateSemesterDto>,
) -> Result<(StatusCode, Json<Semester>), AppError> {
    let school_id = scoped_school_id(&auth_user, dto.school_id)?;
    let semester = SemesterService::create(&state.db, school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "semester", semester.id)
            .new_values(&semester),
    )
    .await;
    Ok((StatusCode::CREATED, Json(semester)))
}

pub async fn get_semesters(
    State(state): State<AppState>,
    RequireSemestersRead(auth_user): RequireSemestersRead,
    filters: Result<Query<SemesterFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedSemesters>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, filters.school_id)?;

    let semesters = SemesterService::list(&state.db, scope, filters).await?;
    Ok(Json(semesters))
}

/// System admins pass `?school_id=`.
pub async fn get_current_semester(
    State(state): State<AppState>,
    RequireSemestersRead(auth_user): RequireSemestersRead,
    filters: Result<Query<SemesterFilterParams>, QueryRejection>,
) -> Result<Json<Semester>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let school_id = scoped_school_id(&auth_user, filters.school_id.map(SchoolId::from))?;

    let semester = SemesterService::current(&state.db, school_id).await?;
    Ok(Json(semester))
}

pub async fn get_semester(
    State(state): State<AppState>,
    RequireSemestersRead(auth_user): RequireSemestersRead,
    Path(id): Path<SemesterId>,
) -> Result<Json<Semester>, AppError> {
    let semester = SemesterService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    Ok(Json(semester))
}

pub async fn update_semester(
    State(state): State<AppState>,
    RequireSemestersUpdate(auth_user): RequireSemestersUpdate,
    headers: HeaderMap,
    Path(id): Path<SemesterId>,
    ValidatedJson(dto): ValidatedJson<UpdateSemesterDto>,
) -> Result<Json<Semester>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = SemesterService::get(&state.db, scope, id).await?;
    let semester = SemesterService::update(&state.db, scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "semester", id)
            .old(&before)
            .new_values(&semester),
    )
    .await;
    Ok(Json(semester))
}

pub async fn set_current_semester(
    State(state): State<AppState>,
    RequireSemestersUpdate(auth_user): RequireSemestersUpdate,
    headers: HeaderMap,
    Path(id): Path<SemesterId>,
) -> Result<Json<Semester>, AppError> {
    let semester = SemesterService::set_current(&state.db, resource_scope(&auth_user)?, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "semester", id)
            .new_values(&semester),
    )
    .await;
    Ok(Json(semester))
}

pub async fn delete_semester(
    State(state): State<AppState>,
    RequireSemestersDelete(auth_user): RequireSemestersDelete,
    headers: HeaderMap,
    Path(id): Path<SemesterId>,
) -> Result<StatusCode, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = SemesterService::get(&state.db, scope, id).await?;
    SemesterService::delete(&state.db, scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "semester", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
