use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    complete_enrollment, create_enrollment, drop_enrollment, get_enrollment, get_enrollments,
};

pub fn init_enrollments_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_enrollments).post(create_enrollment))
        .route("/{id}", get(get_enrollment))
        .route("/{id}/drop", post(drop_enrollment))
        .route("/{id}/complete", post(complete_enrollment))
}
