use axum::{Json, extract::State, http::HeaderMap};
use schoolhub_core::AppError;
use schoolhub_models::MessageResponse;
use schoolhub_models::audit::AuditAction;
use tracing::instrument;

use crate::middleware::auth::AuthUser;
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::model::{
    DisableMfaRequest, EnableMfaResponse, MfaStatusResponse, RecoveryCodesResponse,
    VerifyMfaRequest,
};
use super::service::MfaService;

pub async fn get_mfa_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<MfaStatusResponse>, AppError> {
    let status = MfaService::status(&state.db, auth_user.user_id()?).await?;
    Ok(Json(status))
}

#[instrument(skip(state))]
pub async fn enable_mfa(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<EnableMfaResponse>, AppError> {
    let response = MfaService::enable(
        &state.db,
        auth_user.user_id()?,
        &state.security_config.mfa_issuer,
    )
    .await?;
    Ok(Json(response))
}

#[instrument(skip(state, headers, dto))]
pub async fn verify_mfa(
    State(state): State<AppState>,
    auth_user: AuthUser,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<VerifyMfaRequest>,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
    let user_id = auth_user.user_id()?;
    let response = MfaService::verify(
        &state.db,
        user_id,
        &state.security_config.mfa_issuer,
        &dto.code,
    )
    .await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "mfa", user_id)
            .new_values(&serde_json::json!({ "mfa_enabled": true })),
    )
    .await;
    Ok(Json(response))
}

#[instrument(skip(state, headers, dto))]
pub async fn disable_mfa(
    State(state): State<AppState>,
    auth_user: AuthUser,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<DisableMfaRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = auth_user.user_id()?;
    MfaService::disable(&state.db, user_id, &dto.password).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "mfa", user_id)
            .new_values(&serde_json::json!({ "mfa_enabled": false })),
    )
    .await;
    Ok(Json(MessageResponse::new("MFA has been disabled")))
}

#[instrument(skip(state))]
pub async fn regenerate_recovery_codes(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
    let response = MfaService::regenerate_recovery_codes(&state.db, auth_user.user_id()?).await?;
    Ok(Json(response))
}
