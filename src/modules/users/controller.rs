use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::UserId;

use crate::middleware::auth::{
    RequireUsersCreate, RequireUsersDelete, RequireUsersRead, RequireUsersUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{list_scope, resource_scope, scoped_school_id};
use crate::validator::ValidatedJson;

use super::model::{CreateUserDto, PaginatedUsers, UpdateUserDto, User, UserFilterParams};
use super::service::{UserService, ensure_can_create};

pub async fn create_user(
    State(state): State<AppState>,
    RequireUsersCreate(auth_user): RequireUsersCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateUserDto>,
) -> Result<(StatusCode, Json<User>), AppError> {
    ensure_can_create(auth_user.role()?, dto.role)?;
    let school_id = scoped_school_id(&auth_user, dto.school_id)?;

    let user = UserService::create(&state.db, school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "user", user.id)
            .new_values(&user),
    )
    .await;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_users(
    State(state): State<AppState>,
    RequireUsersRead(auth_user): RequireUsersRead,
    filters: Result<Query<UserFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedUsers>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, filters.school_id)?;

    let users = UserService::list(&state.db, scope, filters).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    RequireUsersRead(auth_user): RequireUsersRead,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    let user = UserService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    RequireUsersUpdate(auth_user): RequireUsersUpdate,
    headers: HeaderMap,
    Path(id): Path<UserId>,
    ValidatedJson(dto): ValidatedJson<UpdateUserDto>,
) -> Result<Json<User>, AppError> {
    let scope = resource_scope(&auth_user)?;
    if dto.is_active == Some(false) && auth_user.user_id()? == id {
        return Err(AppError::bad_request(anyhow!("You cannot deactivate your own account")));
    }

    let before = UserService::get(&state.db, scope, id).await?;
    let user = UserService::update(&state.db, scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "user", id)
            .old(&before)
            .new_values(&user),
    )
    .await;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    RequireUsersDelete(auth_user): RequireUsersDelete,
    headers: HeaderMap,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    if auth_user.user_id()? == id {
        return Err(AppError::bad_request(anyhow!("You cannot delete your own account")));
    }
    let scope = resource_scope(&auth_user)?;
    let before = UserService::get(&state.db, scope, id).await?;
    UserService::delete(&state.db, scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "user", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unlock_user(
    State(state): State<AppState>,
    RequireUsersUpdate(auth_user): RequireUsersUpdate,
    headers: HeaderMap,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    let user = UserService::unlock(&state.db, resource_scope(&auth_user)?, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Unlock, "user", id),
    )
    .await;
    Ok(Json(user))
}
