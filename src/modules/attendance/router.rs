use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    bulk_record_attendance, get_attendance, get_attendance_summary, record_attendance,
};

pub fn init_attendance_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_attendance).post(record_attendance))
        .route("/bulk", post(bulk_record_attendance))
        .route("/summary", get(get_attendance_summary))
}
