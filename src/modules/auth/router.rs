use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::rate_limit::auth_rate_limit;
use crate::state::AppState;

use super::controller::{
    change_password, forgot_password, login, logout, me, refresh_token, reset_password,
    verify_mfa_login, verify_mfa_recovery_login,
};

/// Credential endpoints sit behind the stricter auth rate limit.
pub fn init_auth_router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", post(login))
        .route("/mfa/verify", post(verify_mfa_login))
        .route("/mfa/recovery", post(verify_mfa_recovery_login))
        .route("/refresh", post(refresh_token))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route_layer(middleware::from_fn_with_state(state, auth_rate_limit));

    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .merge(public)
}
