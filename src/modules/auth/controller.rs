use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use schoolhub_core::AppError;
use schoolhub_models::MessageResponse;
use schoolhub_models::audit::{AuditAction, NewAuditEntry};
use schoolhub_models::users::User;
use tracing::instrument;

use crate::middleware::auth::AuthUser;
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::client_ip;
use crate::validator::ValidatedJson;

use super::model::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginOutcome, LoginRequest, LoginResponse,
    MfaRecoveryLoginRequest, MfaVerifyLoginRequest, RefreshTokenRequest, ResetPasswordRequest,
    TokenPair,
};
use super::service::AuthService;

async fn audit_login(state: &AppState, headers: &HeaderMap, response: &LoginResponse) {
    let entry = NewAuditEntry::new(AuditAction::Login, "user", Some(response.user.id.into()))
        .actor(response.user.id, response.user.school_id)
        .ip(client_ip(headers));
    AuditService::record(&state.db, entry).await;
}

/// Either a full session or, for MFA accounts, a temp token.
#[instrument(skip(state, headers, dto))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let outcome =
        AuthService::login(&state.db, dto, &state.jwt_config, &state.security_config).await?;

    if let LoginOutcome::Complete(response) = &outcome {
        audit_login(&state, &headers, response).await;
    }
    Ok(Json(outcome).into_response())
}

#[instrument(skip(state, headers, dto))]
pub async fn verify_mfa_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<MfaVerifyLoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response =
        AuthService::verify_mfa_login(&state.db, dto, &state.jwt_config, &state.security_config)
            .await?;
    audit_login(&state, &headers, &response).await;
    Ok(Json(response))
}

#[instrument(skip(state, headers, dto))]
pub async fn verify_mfa_recovery_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<MfaRecoveryLoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response =
        AuthService::verify_mfa_recovery_login(&state.db, dto, &state.jwt_config).await?;
    audit_login(&state, &headers, &response).await;
    Ok(Json(response))
}

#[instrument(skip(state, dto))]
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let tokens = AuthService::refresh(&state.db, &dto.refresh_token, &state.jwt_config).await?;
    Ok(Json(tokens))
}

#[instrument(skip(state, headers, dto))]
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = auth_user.user_id()?;
    AuthService::logout(&state.db, user_id, &dto.refresh_token).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Logout, "user", user_id),
    )
    .await;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

#[instrument(skip(state, dto))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    AuthService::forgot_password(&state.db, dto, &state.email_config, &state.security_config)
        .await?;
    Ok(Json(MessageResponse::new(
        "If an account exists with that email, a password reset link has been sent.",
    )))
}

#[instrument(skip(state, headers, dto))]
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = AuthService::reset_password(&state.db, dto, &state.email_config).await?;

    let entry = NewAuditEntry::new(AuditAction::PasswordReset, "user", Some(user_id.into()))
        .ip(client_ip(&headers));
    AuditService::record(&state.db, entry).await;

    Ok(Json(MessageResponse::new(
        "Password has been reset successfully. You can now log in with your new password.",
    )))
}

#[instrument(skip(state, headers, dto))]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = auth_user.user_id()?;
    AuthService::change_password(&state.db, user_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::PasswordReset, "user", user_id),
    )
    .await;
    Ok(Json(MessageResponse::new(
        "Password changed. Other sessions have been signed out.",
    )))
}

pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<User>, AppError> {
    let user = AuthService::me(&state.db, auth_user.user_id()?).await?;
    Ok(Json(user))
}
