use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::{CourseId, GradeId, StudentId};

use crate::middleware::auth::{
    AuthUser, RequireGradesCreate, RequireGradesDelete, RequireGradesRead, RequireGradesUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_student_access, list_scope, resource_scope, restrict_student_filter,
    teacher_id_for_user,
};
use crate::validator::ValidatedJson;

use super::model::{
    BulkCreateGradesDto, CourseGradeSummary, CreateGradeDto, Grade, GradeFilterParams,
    PaginatedGrades, UpdateGradeDto,
};
use super::service::{GradeService, Grader};

async fn grader(db: &PgPool, auth: &AuthUser) -> Result<Grader, AppError> {
    let user_id = auth.user_id()?;
    let teacher_id = if auth.is_teacher() {
        let id = teacher_id_for_user(db, user_id)
            .await?
            .ok_or_else(|| AppError::forbidden("No teacher profile is linked to this account"))?;
        Some(id)
    } else {
        None
    };
    Ok(Grader {
        user_id,
        teacher_id,
    })
}

pub async fn create_grade(
    State(state): State<AppState>,
    RequireGradesCreate(auth_user): RequireGradesCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateGradeDto>,
) -> Result<(StatusCode, Json<Grade>), AppError> {
    let scope = resource_scope(&auth_user)?;
    let grader = grader(&state.db, &auth_user).await?;
    let grade = GradeService::create(&state.db, state.cache(), scope, grader, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "grade", grade.id)
            .new_values(&grade),
    )
    .await;
    Ok((StatusCode::CREATED, Json(grade)))
}

pub async fn bulk_create_grades(
    State(state): State<AppState>,
    RequireGradesCreate(auth_user): RequireGradesCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<BulkCreateGradesDto>,
) -> Result<(StatusCode, Json<Vec<Grade>>), AppError> {
    let scope = resource_scope(&auth_user)?;
    let grader = grader(&state.db, &auth_user).await?;
    let grades = GradeService::bulk_create(&state.db, state.cache(), scope, grader, dto).await?;

    for grade in &grades {
        AuditService::record(
            &state.db,
            AuditService::entry(&auth_user, &headers, AuditAction::Create, "grade", grade.id)
                .new_values(grade),
        )
        .await;
    }
    Ok((StatusCode::CREATED, Json(grades)))
}

pub async fn get_grades(
    State(state): State<AppState>,
    RequireGradesRead(auth_user): RequireGradesRead,
    filters: Result<Query<GradeFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedGrades>, AppError> {
    let Query(mut filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;
    filters.student_id = restrict_student_filter(&state.db, &auth_user, filters.student_id).await?;

    let grades = GradeService::list(&state.db, scope, filters).await?;
    Ok(Json(grades))
}

pub async fn get_grade(
    State(state): State<AppState>,
    RequireGradesRead(auth_user): RequireGradesRead,
    Path(id): Path<GradeId>,
) -> Result<Json<Grade>, AppError> {
    let grade = GradeService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ensure_student_access(&state.db, &auth_user, grade.student_id).await?;
    Ok(Json(grade))
}

pub async fn update_grade(
    State(state): State<AppState>,
    RequireGradesUpdate(auth_user): RequireGradesUpdate,
    headers: HeaderMap,
    Path(id): Path<GradeId>,
    ValidatedJson(dto): ValidatedJson<UpdateGradeDto>,
) -> Result<Json<Grade>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let grader = grader(&state.db, &auth_user).await?;
    let before = GradeService::get(&state.db, scope, id).await?;
    let grade = GradeService::update(&state.db, state.cache(), scope, grader, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "grade", id)
            .old(&before)
            .new_values(&grade),
    )
    .await;
    Ok(Json(grade))
}

pub async fn delete_grade(
    State(state): State<AppState>,
    RequireGradesDelete(auth_user): RequireGradesDelete,
    headers: HeaderMap,
    Path(id): Path<GradeId>,
) -> Result<StatusCode, AppError> {
    let scope = resource_scope(&auth_user)?;
    let grader = grader(&state.db, &auth_user).await?;
    let before = GradeService::delete(&state.db, state.cache(), scope, grader, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "grade", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_course_summary(
    State(state): State<AppState>,
    RequireGradesRead(auth_user): RequireGradesRead,
    Path((student_id, course_id)): Path<(StudentId, CourseId)>,
) -> Result<Json<CourseGradeSummary>, AppError> {
    ensure_student_access(&state.db, &auth_user, student_id).await?;
    let summary = GradeService::course_summary(
        &state.db,
        resource_scope(&auth_user)?,
        student_id,
        course_id,
    )
    .await?;
    Ok(Json(summary))
}
