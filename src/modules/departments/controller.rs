use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::DepartmentId;

use crate::middleware::auth::{
    RequireDepartmentsCreate, RequireDepartmentsDelete, RequireDepartmentsRead,
    RequireDepartmentsUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{list_scope, resource_scope, scoped_school_id};
use crate::validator::ValidatedJson;

use super::model::{
    CreateDepartmentDto, Department, DepartmentFilterParams, PaginatedDepartments,
    UpdateDepartmentDto,
};
use super::service::DepartmentService;

pub async fn create_department(
    State(state): State<AppState>,
    RequireDepartmentsCreate(auth_user): RequireDepartmentsCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateDepartmentDto>,
) -> Result<(StatusCode, Json<Department>), AppError> {
    let school_id = scoped_school_id(&auth_user, dto.school_id)?;
    let department = DepartmentService::create(&state.db, school_id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "department", department.id)
            .new_values(&department),
    )
    .await;
    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn get_departments(
    State(state): State<AppState>,
    RequireDepartmentsRead(auth_user): RequireDepartmentsRead,
    filters: Result<Query<DepartmentFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedDepartments>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, filters.school_id)?;

    let departments = DepartmentService::list(&state.db, scope, filters).await?;
    Ok(Json(departments))
}

pub async fn get_department(
    State(state): State<AppState>,
    RequireDepartmentsRead(auth_user): RequireDepartmentsRead,
    Path(id): Path<DepartmentId>,
) -> Result<Json<Department>, AppError> {
    let department = DepartmentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    Ok(Json(department))
}

pub async fn update_department(
    State(state): State<AppState>,
    RequireDepartmentsUpdate(auth_user): RequireDepartmentsUpdate,
    headers: HeaderMap,
    Path(id): Path<DepartmentId>,
    ValidatedJson(dto): ValidatedJson<UpdateDepartmentDto>,
) -> Result<Json<Department>, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = DepartmentService::get(&state.db, scope, id).await?;
    let department = DepartmentService::update(&state.db, scope, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "department", id)
            .old(&before)
            .new_values(&department),
    )
    .await;
    Ok(Json(department))
}

pub async fn delete_department(
    State(state): State<AppState>,
    RequireDepartmentsDelete(auth_user): RequireDepartmentsDelete,
    headers: HeaderMap,
    Path(id): Path<DepartmentId>,
) -> Result<StatusCode, AppError> {
    let scope = resource_scope(&auth_user)?;
    let before = DepartmentService::get(&state.db, scope, id).await?;
    DepartmentService::delete(&state.db, scope, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "department", id)
            .old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
