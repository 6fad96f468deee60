use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::SchoolId;
use schoolhub_core::serde::deserialize_optional_uuid;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::auth::{AuthUser, RequireSettingsRead, RequireSettingsUpdate};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{list_scope, scoped_school_id};
use crate::validator::ValidatedJson;

use super::model::{Setting, SettingScopeParams, UpsertSettingDto};
use super::service::SettingService;

#[derive(Debug, Deserialize)]
pub struct WriteScopeParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub global: bool,
}

/// Global rows are for system admins; everyone else writes their school's.
fn write_scope(
    auth_user: &AuthUser,
    global: bool,
    school_id: Option<Uuid>,
) -> Result<Option<SchoolId>, AppError> {
    if global {
        if !auth_user.is_system_admin() {
            return Err(AppError::forbidden(
                "Only system admins may change global settings",
            ));
        }
        return Ok(None);
    }
    scoped_school_id(auth_user, school_id.map(SchoolId::from)).map(Some)
}

pub async fn get_settings(
    State(state): State<AppState>,
    RequireSettingsRead(auth_user): RequireSettingsRead,
    Query(params): Query<SettingScopeParams>,
) -> Result<Json<Vec<Setting>>, AppError> {
    let scope = list_scope(&auth_user, params.school_id)?;
    let settings = SettingService::list(&state.db, state.cache(), scope).await?;
    Ok(Json(settings))
}

pub async fn get_setting(
    State(state): State<AppState>,
    RequireSettingsRead(auth_user): RequireSettingsRead,
    Path(key): Path<String>,
    Query(params): Query<SettingScopeParams>,
) -> Result<Json<Setting>, AppError> {
    let scope = list_scope(&auth_user, params.school_id)?;
    let setting = SettingService::get(&state.db, state.cache(), scope, &key).await?;
    Ok(Json(setting))
}

pub async fn upsert_setting(
    State(state): State<AppState>,
    RequireSettingsUpdate(auth_user): RequireSettingsUpdate,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(params): Query<WriteScopeParams>,
    ValidatedJson(dto): ValidatedJson<UpsertSettingDto>,
) -> Result<Json<Setting>, AppError> {
    let scope = write_scope(&auth_user, dto.global || params.global, params.school_id)?;
    let setting = SettingService::upsert(
        &state.db,
        state.cache(),
        scope,
        &key,
        auth_user.user_id()?,
        dto,
    )
    .await?;

    AuditService::record(
        &state.db,
        AuditService::entry(
            &auth_user,
            &headers,
            AuditAction::Update,
            "setting",
            setting.id,
        )
        .new_values(&setting),
    )
    .await;
    Ok(Json(setting))
}

pub async fn delete_setting(
    State(state): State<AppState>,
    RequireSettingsUpdate(auth_user): RequireSettingsUpdate,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(params): Query<WriteScopeParams>,
) -> Result<StatusCode, AppError> {
    let scope = write_scope(&auth_user, params.global, params.school_id)?;
    let deleted = SettingService::delete(&state.db, state.cache(), scope, &key).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(
            &auth_user,
            &headers,
            AuditAction::Delete,
            "setting",
            deleted.id,
        )
        .old(&deleted),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
