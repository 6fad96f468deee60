use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::courses::Course;
use schoolhub_models::ids::TeacherId;

use crate::middleware::auth::{
    RequireTeachersCreate, RequireTeachersDelete, RequireTeachersRead, RequireTeachersUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{list_scope, resource_scope, scoped_school_id};
use crate::validator::ValidatedJson;

use super::model::{
    CreateTeacherDto, PaginatedTeachers, Teacher, TeacherFilterParams, UpdateTeacherDto,
};
use super::service::TeacherService;

pub async fn create_teacher(
    State(state): State<AppState>,
    RequireTeachersCreate(auth_user): RequireTeachersCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateTeacherDto>,
) -> Result<(StatusCode, Json<Teacher>), AppError> {
    let school_id = scoped_school_id(&auth_user, dto.school_id)?;
    let teacher = TeacherService::create(&state.db, school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "teacher", teacher.id)
            .new_values(&teacher),
    )
    .await;
    Ok((StatusCode::CREATED, Json(teacher)))
}

pub async fn get_teachers(
    State(state): State<AppState>,
    RequireTeachersRead(auth_user): RequireTeachersRead,
    filters: Result<Query<TeacherFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedTeachers>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, filters.school_id)?;

    let teachers = TeacherService::list(&state.db, scope, filters).await?;
    Ok(Json(teachers))
}

pub async fn get_teacher(
    State(state): State<AppState>,
    RequireTeachersRead(auth_user): RequireTeachersRead,
    Path(id): Path<TeacherId>,
) -> Result<Json<Teacher>, AppError> {
    let teacher = TeacherService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    Ok(Json(teacher))
}

pub async fn update_teacher(
    State(state): State<AppState>,
    RequireTeachersUpdate(auth_user): RequireTeachersUpdate,
    headers: HeaderMap,
    Path(id): Path<TeacherId>,
    ValidatedJson(dto): ValidatedJson<UpdateTeacherDto>,
) -> Result<Json<Teacher>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = TeacherService::get(&state.db, scope, id).await?;
    let teacher = TeacherService::update(&state.db, scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "teacher", id)
            .old(&before)
            .new_values(&teacher),
    )
    .await;
    Ok(Json(teacher))
}

pub async fn delete_teacher(
    State(state): State<AppState>,
    RequireTeachersDelete(auth_user): RequireTeachersDelete,
    headers: HeaderMap,
    Path(id): Path<TeacherId>,
) -> Result<StatusCode, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = TeacherService::delete(&state.db, state.cache(), scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "teacher", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_teacher_courses(
    State(state): State<AppState>,
    RequireTeachersRead(auth_user): RequireTeachersRead,
    Path(id): Path<TeacherId>,
) -> Result<Json<Vec<Course>>, AppError> {
    TeacherService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    let courses = TeacherService::courses(&state.db, id).await?;
    Ok(Json(courses))
}
