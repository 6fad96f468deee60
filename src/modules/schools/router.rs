use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{create_school, delete_school, get_school, get_schools, update_school};

pub fn init_schools_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_schools).post(create_school))
        .route(
            "/{id}",
            get(get_school).put(update_school).delete(delete_school),
        )
}
