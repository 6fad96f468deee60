use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::courses::Course;
use schoolhub_models::ids::CourseId;

use crate::middleware::auth::{AuthUser, RequireAttendanceRead, RequireAttendanceRecord};
use crate::modules::audit_logs::AuditService;
use crate::modules::courses::CourseService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_course_staff, list_scope, resource_scope, restrict_student_filter,
};
use crate::validator::ValidatedJson;

use super::model::{
    Attendance, AttendanceFilterParams, AttendanceSummary, AttendanceSummaryParams,
    BulkRecordAttendanceDto, PaginatedAttendance, RecordAttendanceDto,
};
use super::service::AttendanceService;

async fn course_for_marking(
    state: &AppState,
    auth_user: &AuthUser,
    course_id: CourseId,
) -> Result<Course, AppError> {
    let scope = resource_scope(auth_user)?;
    let course = CourseService::get(&state.db, state.cache(), scope, course_id).await?;
    ensure_course_staff(&state.db, auth_user, course.teacher_id).await?;
    Ok(course)
}

pub async fn record_attendance(
    State(state): State<AppState>,
    RequireAttendanceRecord(auth_user): RequireAttendanceRecord,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<RecordAttendanceDto>,
) -> Result<(StatusCode, Json<Attendance>), AppError> {
    let course = course_for_marking(&state, &auth_user, dto.course_id).await?;
    let row =
        AttendanceService::record(&state.db, course.school_id, auth_user.user_id()?, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "attendance", row.id)
            .new_values(&row),
    )
    .await;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn bulk_record_attendance(
    State(state): State<AppState>,
    RequireAttendanceRecord(auth_user): RequireAttendanceRecord,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<BulkRecordAttendanceDto>,
) -> Result<(StatusCode, Json<Vec<Attendance>>), AppError> {
    let course = course_for_marking(&state, &auth_user, dto.course_id).await?;
    let rows =
        AttendanceService::bulk_record(&state.db, course.school_id, auth_user.user_id()?, dto)
            .await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "attendance", course.id)
            .new_values(&rows),
    )
    .await;
    Ok((StatusCode::CREATED, Json(rows)))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    RequireAttendanceRead(auth_user): RequireAttendanceRead,
    filters: Result<Query<AttendanceFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedAttendance>, AppError> {
    let Query(mut filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;
    filters.student_id = restrict_student_filter(&state.db, &auth_user, filters.student_id).await?;

    let rows = AttendanceService::list(&state.db, scope, filters).await?;
    Ok(Json(rows))
}

pub async fn get_attendance_summary(
    State(state): State<AppState>,
    RequireAttendanceRead(auth_user): RequireAttendanceRead,
    params: Result<Query<AttendanceSummaryParams>, QueryRejection>,
) -> Result<Json<AttendanceSummary>, AppError> {
    let Query(mut params) = params
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;
    params.student_id = restrict_student_filter(&state.db, &auth_user, params.student_id).await?;

    let summary = AttendanceService::summary(&state.db, scope, params).await?;
    Ok(Json(summary))
}
