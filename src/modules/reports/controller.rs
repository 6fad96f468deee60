use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::Response,
};
use schoolhub_core::AppError;
use schoolhub_models::courses::Course;
use schoolhub_models::ids::{CourseId, StudentId};

use crate::middleware::auth::{AuthUser, RequireReportsExport, RequireReportsView};
use crate::modules::courses::CourseService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    ensure_course_staff, ensure_student_access, list_scope, resource_scope,
};

use super::csv_export::{file_stem, roster_csv, transcript_csv};
use super::model::{
    CourseAttendanceReport, CourseGradeReport, DashboardParams, DashboardStats, Transcript,
};
use super::service::ReportService;

fn csv_response(file_name: &str, bytes: Vec<u8>) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}.csv\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(AppError::internal)
}

/// Course-level reports are for admins and the course's own teacher.
async fn reportable_course(
    state: &AppState,
    auth_user: &AuthUser,
    id: CourseId,
) -> Result<Course, AppError> {
    if auth_user.is_student() {
        return Err(AppError::forbidden("Students cannot view course reports"));
    }
    let course =
        CourseService::get(&state.db, state.cache(), resource_scope(auth_user)?, id).await?;
    ensure_course_staff(&state.db, auth_user, course.teacher_id).await?;
    Ok(course)
}

async fn load_transcript(
    state: &AppState,
    auth_user: &AuthUser,
    id: StudentId,
) -> Result<Transcript, AppError> {
    ensure_student_access(&state.db, auth_user, id).await?;
    ReportService::transcript(&state.db, state.cache(), resource_scope(auth_user)?, id).await
}

pub async fn get_transcript(
    State(state): State<AppState>,
    RequireReportsView(auth_user): RequireReportsView,
    Path(id): Path<StudentId>,
) -> Result<Json<Transcript>, AppError> {
    let transcript = load_transcript(&state, &auth_user, id).await?;
    Ok(Json(transcript))
}

pub async fn export_transcript(
    State(state): State<AppState>,
    RequireReportsExport(auth_user): RequireReportsExport,
    Path(id): Path<StudentId>,
) -> Result<Response, AppError> {
    let transcript = load_transcript(&state, &auth_user, id).await?;
    let bytes = transcript_csv(&transcript)?;
    csv_response(
        &format!("transcript_{}", file_stem(&transcript.student_number)),
        bytes,
    )
}

pub async fn get_course_grade_report(
    State(state): State<AppState>,
    RequireReportsView(auth_user): RequireReportsView,
    Path(id): Path<CourseId>,
) -> Result<Json<CourseGradeReport>, AppError> {
    let course = reportable_course(&state, &auth_user, id).await?;
    let report = ReportService::course_grades(&state.db, &course).await?;
    Ok(Json(report))
}

pub async fn get_course_attendance_report(
    State(state): State<AppState>,
    RequireReportsView(auth_user): RequireReportsView,
    Path(id): Path<CourseId>,
) -> Result<Json<CourseAttendanceReport>, AppError> {
    let course = reportable_course(&state, &auth_user, id).await?;
    let report = ReportService::course_attendance(&state.db, &course).await?;
    Ok(Json(report))
}

pub async fn export_course_roster(
    State(state): State<AppState>,
    RequireReportsExport(auth_user): RequireReportsExport,
    Path(id): Path<CourseId>,
) -> Result<Response, AppError> {
    let course = reportable_course(&state, &auth_user, id).await?;
    let roster = CourseService::roster(&state.db, state.cache(), id).await?;
    csv_response(
        &format!("roster_{}", file_stem(&course.code)),
        roster_csv(&roster)?,
    )
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    RequireReportsView(auth_user): RequireReportsView,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardStats>, AppError> {
    if auth_user.is_student() {
        return Err(AppError::forbidden("Students cannot view the dashboard"));
    }
    let scope = list_scope(&auth_user, params.school_id)?;
    let stats = ReportService::dashboard(&state.db, scope).await?;
    Ok(Json(stats))
}
