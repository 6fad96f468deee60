use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{get_audit_log, list_audit_logs};

pub fn init_audit_logs_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/{id}", get(get_audit_log))
}
