use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::ScheduleId;

use crate::middleware::auth::{
    RequireSchedulesCreate, RequireSchedulesDelete, RequireSchedulesRead, RequireSchedulesUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::modules::courses::CourseService;
use crate::state::AppState;
use crate::utils::auth_helpers::{list_scope, resource_scope};
use crate::validator::ValidatedJson;

use super::model::{CreateScheduleDto, Schedule, ScheduleFilterParams, UpdateScheduleDto};
use super::service::ScheduleService;

pub async fn create_schedule(
    State(state): State<AppState>,
    RequireSchedulesCreate(auth_user): RequireSchedulesCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateScheduleDto>,
) -> Result<(StatusCode, Json<Schedule>), AppError> {
    let scope = resource_scope(&auth_user)?;
    let course = CourseService::get(&state.db, state.cache(), scope, dto.course_id).await?;
    let schedule = ScheduleService::create(&state.db, &course, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "schedule", schedule.id)
            .new_values(&schedule),
    )
    .await;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn get_schedules(
    State(state): State<AppState>,
    RequireSchedulesRead(auth_user): RequireSchedulesRead,
    filters: Result<Query<ScheduleFilterParams>, QueryRejection>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;

    let schedules = ScheduleService::list(&state.db, scope, filters).await?;
    Ok(Json(schedules))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    RequireSchedulesRead(auth_user): RequireSchedulesRead,
    Path(id): Path<ScheduleId>,
) -> Result<Json<Schedule>, AppError> {
    let schedule = ScheduleService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    Ok(Json(schedule))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    RequireSchedulesUpdate(auth_user): RequireSchedulesUpdate,
    headers: HeaderMap,
    Path(id): Path<ScheduleId>,
    ValidatedJson(dto): ValidatedJson<UpdateScheduleDto>,
) -> Result<Json<Schedule>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = ScheduleService::get(&state.db, scope, id).await?;
    let course = CourseService::get(&state.db, state.cache(), scope, before.course_id).await?;

    let schedule = ScheduleService::update(&state.db, &before, course.teacher_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "schedule", id)
            .old(&before)
            .new_values(&schedule),
    )
    .await;
    Ok(Json(schedule))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    RequireSchedulesDelete(auth_user): RequireSchedulesDelete,
    headers: HeaderMap,
    Path(id): Path<ScheduleId>,
) -> Result<StatusCode, AppError> {
    let before = ScheduleService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ScheduleService::delete(&state.db, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "schedule", id)
            .old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
