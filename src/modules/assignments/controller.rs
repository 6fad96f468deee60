use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::{AssignmentId, CourseId, SubmissionId};

use crate::middleware::auth::{
    AuthUser, RequireAssignmentsCreate, RequireAssignmentsDelete, RequireAssignmentsRead,
    RequireAssignmentsUpdate, RequireSubmissionsCreate, RequireSubmissionsGrade,
};
use crate::modules::audit_logs::AuditService;
use crate::modules::courses::CourseService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_course_staff, list_scope, require_own_student_id, resource_scope,
};
use crate::validator::ValidatedJson;

use super::model::{
    Assignment, AssignmentFilterParams, CreateAssignmentDto, GradeSubmissionDto,
    PaginatedAssignments, Submission, SubmitAssignmentDto, UpdateAssignmentDto,
};
use super::service::AssignmentService;

/// Loads the course in the caller's scope and checks a teacher owns it.
async fn ensure_manages_course(
    state: &AppState,
    auth_user: &AuthUser,
    course_id: CourseId,
) -> Result<(), AppError> {
    let course =
        CourseService::get(&state.db, state.cache(), resource_scope(auth_user)?, course_id).await?;
    ensure_course_staff(&state.db, auth_user, course.teacher_id).await
}

pub async fn create_assignment(
    State(state): State<AppState>,
    RequireAssignmentsCreate(auth_user): RequireAssignmentsCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateAssignmentDto>,
) -> Result<(StatusCode, Json<Assignment>), AppError> {
    let scope = resource_scope(&auth_user)?;
    let course = CourseService::get(&state.db, state.cache(), scope, dto.course_id).await?;
    ensure_course_staff(&state.db, &auth_user, course.teacher_id).await?;

    let assignment =
        AssignmentService::create(&state.db, course.school_id, auth_user.user_id()?, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(
            &auth_user,
            &headers,
            AuditAction::Create,
            "assignment",
            assignment.id,
        )
        .new_values(&assignment),
    )
    .await;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn get_assignments(
    State(state): State<AppState>,
    RequireAssignmentsRead(auth_user): RequireAssignmentsRead,
    filters: Result<Query<AssignmentFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedAssignments>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;

    let assignments = AssignmentService::list(&state.db, scope, filters).await?;
    Ok(Json(assignments))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    RequireAssignmentsRead(auth_user): RequireAssignmentsRead,
    Path(id): Path<AssignmentId>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = AssignmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    Ok(Json(assignment))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    RequireAssignmentsUpdate(auth_user): RequireAssignmentsUpdate,
    headers: HeaderMap,
    Path(id): Path<AssignmentId>,
    ValidatedJson(dto): ValidatedJson<UpdateAssignmentDto>,
) -> Result<Json<Assignment>, AppError> {
    let before = AssignmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ensure_manages_course(&state, &auth_user, before.course_id).await?;

    let assignment = AssignmentService::update(&state.db, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "assignment", id)
            .old(&before)
            .new_values(&assignment),
    )
    .await;
    Ok(Json(assignment))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    RequireAssignmentsDelete(auth_user): RequireAssignmentsDelete,
    headers: HeaderMap,
    Path(id): Path<AssignmentId>,
) -> Result<StatusCode, AppError> {
    let before = AssignmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ensure_manages_course(&state, &auth_user, before.course_id).await?;

    AssignmentService::delete(&state.db, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "assignment", id)
            .old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Students submit for themselves; staff must name the student.
pub async fn submit_assignment(
    State(state): State<AppState>,
    RequireSubmissionsCreate(auth_user): RequireSubmissionsCreate,
    headers: HeaderMap,
    Path(id): Path<AssignmentId>,
    ValidatedJson(dto): ValidatedJson<SubmitAssignmentDto>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let assignment = AssignmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;

    let student_id = if auth_user.is_student() {
        require_own_student_id(&state.db, &auth_user).await?
    } else {
        dto.student_id.ok_or_else(|| {
            AppError::bad_request(anyhow::anyhow!("student_id is required"))
        })?
    };

    let submission = AssignmentService::submit(&state.db, &assignment, student_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(
            &auth_user,
            &headers,
            AuditAction::Create,
            "submission",
            submission.id,
        )
        .new_values(&submission),
    )
    .await;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Staff see every submission; students only their own.
pub async fn get_submissions(
    State(state): State<AppState>,
    RequireAssignmentsRead(auth_user): RequireAssignmentsRead,
    Path(id): Path<AssignmentId>,
) -> Result<Json<Vec<Submission>>, AppError> {
    let assignment = AssignmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;

    let student_filter = if auth_user.is_student() {
        Some(require_own_student_id(&state.db, &auth_user).await?)
    } else {
        ensure_manages_course(&state, &auth_user, assignment.course_id).await?;
        None
    };

    let submissions = AssignmentService::submissions(&state.db, id, student_filter).await?;
    Ok(Json(submissions))
}

pub async fn grade_submission(
    State(state): State<AppState>,
    RequireSubmissionsGrade(auth_user): RequireSubmissionsGrade,
    headers: HeaderMap,
    Path(id): Path<SubmissionId>,
    ValidatedJson(dto): ValidatedJson<GradeSubmissionDto>,
) -> Result<Json<Submission>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let course_id = AssignmentService::submission_course(&state.db, scope, id).await?;
    ensure_manages_course(&state, &auth_user, course_id).await?;

    let submission =
        AssignmentService::grade_submission(&state.db, scope, id, auth_user.user_id()?, dto)
            .await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "submission", id)
            .new_values(&submission),
    )
    .await;
    Ok(Json(submission))
}
