use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::{AppError, PaginationParams};
use schoolhub_models::audit::AuditAction;
use schoolhub_models::enrollments::StudentCourse;
use schoolhub_models::grades::GradeFilterParams;
use schoolhub_models::ids::StudentId;

use crate::middleware::auth::{
    AuthUser, RequireStudentsCreate, RequireStudentsDelete, RequireStudentsRead,
    RequireStudentsUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::modules::grades::GradeService;
use crate::modules::grades::model::PaginatedGrades;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_student_access, list_scope, require_own_student_id, resource_scope, scoped_school_id,
};
use crate::validator::ValidatedJson;

use super::model::{
    CreateStudentDto, PaginatedStudents, Student, StudentFilterParams, StudentGpaResponse,
    UpdateStudentDto,
};
use super::service::StudentService;

/// Tenant check plus the own-record rule for students.
async fn readable_student(
    state: &AppState,
    auth_user: &AuthUser,
    id: StudentId,
) -> Result<Student, AppError> {
    ensure_student_access(&state.db, auth_user, id).await?;
    StudentService::get(&state.db, state.cache(), resource_scope(auth_user)?, id).await
}

pub async fn create_student(
    State(state): State<AppState>,
    RequireStudentsCreate(auth_user): RequireStudentsCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateStudentDto>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    let school_id = scoped_school_id(&auth_user, dto.school_id)?;
    let student = StudentService::create(&state.db, state.cache(), school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "student", student.id)
            .new_values(&student),
    )
    .await;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn get_students(
    State(state): State<AppState>,
    RequireStudentsRead(auth_user): RequireStudentsRead,
    filters: Result<Query<StudentFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedStudents>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow!("Invalid query parameters: {}", e)))?;
    if auth_user.is_student() {
        return Err(AppError::forbidden("Students may only access their own records"));
    }
    let scope = list_scope(&auth_user, filters.school_id)?;

    let students = StudentService::list(&state.db, state.cache(), scope, filters).await?;
    Ok(Json(students))
}

/// The caller's own profile.
pub async fn get_my_profile(
    State(state): State<AppState>,
    RequireStudentsRead(auth_user): RequireStudentsRead,
) -> Result<Json<Student>, AppError> {
    let id = require_own_student_id(&state.db, &auth_user).await?;
    let student = StudentService::get(&state.db, state.cache(), None, id).await?;
    Ok(Json(student))
}

pub async fn get_student(
    State(state): State<AppState>,
    RequireStudentsRead(auth_user): RequireStudentsRead,
    Path(id): Path<StudentId>,
) -> Result<Json<Student>, AppError> {
    let student = readable_student(&state, &auth_user, id).await?;
    Ok(Json(student))
}

pub async fn update_student(
    State(state): State<AppState>,
    RequireStudentsUpdate(auth_user): RequireStudentsUpdate,
    headers: HeaderMap,
    Path(id): Path<StudentId>,
    ValidatedJson(dto): ValidatedJson<UpdateStudentDto>,
) -> Result<Json<Student>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = StudentService::get(&state.db, None, scope, id).await?;
    let student = StudentService::update(&state.db, state.cache(), scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "student", id)
            .old(&before)
            .new_values(&student),
    )
    .await;
    Ok(Json(student))
}

pub async fn delete_student(
    State(state): State<AppState>,
    RequireStudentsDelete(auth_user): RequireStudentsDelete,
    headers: HeaderMap,
    Path(id): Path<StudentId>,
) -> Result<StatusCode, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = StudentService::delete(&state.db, state.cache(), scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "student", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_student_gpa(
    State(state): State<AppState>,
    RequireStudentsRead(auth_user): RequireStudentsRead,
    Path(id): Path<StudentId>,
) -> Result<Json<StudentGpaResponse>, AppError> {
    readable_student(&state, &auth_user, id).await?;
    let gpa = GradeService::student_gpa(&state.db, state.cache(), id).await?;
    Ok(Json(gpa))
}

pub async fn get_student_enrollments(
    State(state): State<AppState>,
    RequireStudentsRead(auth_user): RequireStudentsRead,
    Path(id): Path<StudentId>,
) -> Result<Json<Vec<StudentCourse>>, AppError> {
    readable_student(&state, &auth_user, id).await?;
    let courses = StudentService::enrollments(&state.db, id).await?;
    Ok(Json(courses))
}

pub async fn get_student_grades(
    State(state): State<AppState>,
    RequireStudentsRead(auth_user): RequireStudentsRead,
    Path(id): Path<StudentId>,
    pagination: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<PaginatedGrades>, AppError> {
    let Query(pagination) = pagination
        .map_err(|e| AppError::bad_request(anyhow!("Invalid query parameters: {}", e)))?;
    let student = readable_student(&state, &auth_user, id).await?;

    let filters = GradeFilterParams {
        student_id: Some(id.into_inner()),
        course_id: None,
        enrollment_id: None,
        grade_type: None,
        pagination,
    };
    let grades = GradeService::list(&state.db, Some(student.school_id), filters).await?;
    Ok(Json(grades))
}
