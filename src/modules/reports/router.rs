use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{
    export_course_roster, export_transcript, get_course_attendance_report,
    get_course_grade_report, get_dashboard, get_transcript,
};

pub fn init_reports_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/students/{id}/transcript", get(get_transcript))
        .route("/students/{id}/transcript/export", get(export_transcript))
        .route("/courses/{id}/grades", get(get_course_grade_report))
        .route("/courses/{id}/attendance", get(get_course_attendance_report))
        .route("/courses/{id}/roster/export", get(export_course_roster))
}
