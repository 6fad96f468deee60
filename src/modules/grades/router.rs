use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    bulk_create_grades, create_grade, delete_grade, get_course_summary, get_grade, get_grades,
    update_grade,
};

pub fn init_grades_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_grades).post(create_grade))
        .route("/bulk", post(bulk_create_grades))
        .route(
            "/students/{student_id}/courses/{course_id}/summary",
            get(get_course_summary),
        )
        .route(
            "/{id}",
            get(get_grade).put(update_grade).delete(delete_grade),
        )
}
