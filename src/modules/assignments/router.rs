use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_assignment, delete_assignment, get_assignment, get_assignments, get_submissions,
    grade_submission, submit_assignment, update_assignment,
};

pub fn init_assignments_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_assignments).post(create_assignment))
        .route(
            "/{id}",
            get(get_assignment)
                .put(update_assignment)
                .delete(delete_assignment),
        )
        .route(
            "/{id}/submissions",
            get(get_submissions).post(submit_assignment),
        )
        .route("/submissions/{id}/grade", post(grade_submission))
}
