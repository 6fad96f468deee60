use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub use super::controller::notification_hub_handler;
use super::controller::{
    get_my_notifications, get_unread_count, mark_all_notifications_read,
    mark_notification_read, send_notification,
};

pub fn init_notifications_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_my_notifications).post(send_notification))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", post(mark_all_notifications_read))
        .route("/{id}/read", post(mark_notification_read))
}
