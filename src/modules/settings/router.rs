use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{delete_setting, get_setting, get_settings, upsert_setting};

pub fn init_settings_router() -> Router<AppState> {
    Router::new().route("/", get(get_settings)).route(
        "/{key}",
        get(get_setting).put(upsert_setting).delete(delete_setting),
    )
}
