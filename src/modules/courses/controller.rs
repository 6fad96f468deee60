use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::CourseId;

use crate::middleware::auth::{
    RequireCoursesCreate, RequireCoursesDelete, RequireCoursesRead, RequireCoursesUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_course_staff, list_scope, resource_scope, scoped_school_id,
};
use crate::validator::ValidatedJson;

use super::model::{
    Course, CourseFilterParams, CreateCourseDto, PaginatedCourses, RosterEntry, UpdateCourseDto,
};
use super::service::CourseService;

pub async fn create_course(
    State(state): State<AppState>,
    RequireCoursesCreate(auth_user): RequireCoursesCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateCourseDto>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let school_id = scoped_school_id(&auth_user, dto.school_id)?;
    let course = CourseService::create(&state.db, state.cache(), school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "course", course.id)
            .new_values(&course),
    )
    .await;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn get_courses(
    State(state): State<AppState>,
    RequireCoursesRead(auth_user): RequireCoursesRead,
    filters: Result<Query<CourseFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedCourses>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, filters.school_id)?;

    let courses = CourseService::list(&state.db, state.cache(), scope, filters).await?;
    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<AppState>,
    RequireCoursesRead(auth_user): RequireCoursesRead,
    Path(id): Path<CourseId>,
) -> Result<Json<Course>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let course = CourseService::get(&state.db, state.cache(), scope, id).await?;
    Ok(Json(course))
}

pub async fn update_course(
    State(state): State<AppState>,
    RequireCoursesUpdate(auth_user): RequireCoursesUpdate,
    headers: HeaderMap,
    Path(id): Path<CourseId>,
    ValidatedJson(dto): ValidatedJson<UpdateCourseDto>,
) -> Result<Json<Course>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = CourseService::get(&state.db, None, scope, id).await?;
    let course = CourseService::update(&state.db, state.cache(), scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "course", id)
            .old(&before)
            .new_values(&course),
    )
    .await;
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    RequireCoursesDelete(auth_user): RequireCoursesDelete,
    headers: HeaderMap,
    Path(id): Path<CourseId>,
) -> Result<StatusCode, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = CourseService::delete(&state.db, state.cache(), scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "course", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Staff only. Teachers see the rosters of their own courses.
pub async fn get_course_roster(
    State(state): State<AppState>,
    RequireCoursesRead(auth_user): RequireCoursesRead,
    Path(id): Path<CourseId>,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    if auth_user.is_student() {
        return Err(AppError::forbidden("Students cannot view course rosters"));
    }
    let scope = resource_scope(&auth_user)?;
    let course = CourseService::get(&state.db, state.cache(), scope, id).await?;
    ensure_course_staff(&state.db, &auth_user, course.teacher_id).await?;

    let roster = CourseService::roster(&state.db, state.cache(), id).await?;
    Ok(Json(roster))
}
