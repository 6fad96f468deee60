use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use schoolhub_core::AppError;
use schoolhub_models::ids::AuditLogId;

use crate::middleware::auth::RequireAuditRead;
use crate::state::AppState;
use crate::utils::auth_helpers::resource_scope;

use super::model::{AuditLog, AuditLogFilterParams, PaginatedAuditLogs};
use super::service::AuditService;

/// Audit trail, newest first. School admins see their own school only.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    RequireAuditRead(auth_user): RequireAuditRead,
    filters: Result<Query<AuditLogFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedAuditLogs>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = resource_scope(&auth_user)?;

    let logs = AuditService::list(&state.db, scope, filters).await?;
    Ok(Json(logs))
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    RequireAuditRead(auth_user): RequireAuditRead,
    Path(id): Path<AuditLogId>,
) -> Result<Json<AuditLog>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let log = AuditService::get(&state.db, scope, id).await?;
    Ok(Json(log))
}
