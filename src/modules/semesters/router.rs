use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_semester, delete_semester, get_current_semester, get_semester, get_semesters,
    set_current_semester, update_semester,
};

pub fn init_semesters_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_semesters).post(create_semester))
        .route("/current", get(get_current_semester))
        .route(
            "/{id}",
            get(get_semester).put(update_semester).delete(delete_semester),
        )
        .route("/{id}/set-current", post(set_current_semester))
}
