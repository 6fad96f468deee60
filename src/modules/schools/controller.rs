use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::SchoolId;

use crate::middleware::auth::{
    AuthUser, RequireSchoolsCreate, RequireSchoolsDelete, RequireSchoolsRead, RequireSchoolsUpdate,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::resource_scope;
use crate::validator::ValidatedJson;

use super::model::{CreateSchoolDto, PaginatedSchools, School, SchoolFilterParams, UpdateSchoolDto};
use super::service::SchoolService;

/// School admins only ever see their own school.
fn ensure_school_access(auth_user: &AuthUser, id: SchoolId) -> Result<(), AppError> {
    match resource_scope(auth_user)? {
        Some(own) if own != id => Err(AppError::forbidden("Access denied to this school")),
        _ => Ok(()),
    }
}

pub async fn create_school(
    State(state): State<AppState>,
    RequireSchoolsCreate(auth_user): RequireSchoolsCreate,
    headers: HeaderMap,
    ValidatedJson(dto): ValidatedJson<CreateSchoolDto>,
) -> Result<(StatusCode, Json<School>), AppError> {
    let school = SchoolService::create(&state.db, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "school", school.id)
            .new_values(&school),
    )
    .await;
    Ok((StatusCode::CREATED, Json(school)))
}

pub async fn get_schools(
    State(state): State<AppState>,
    RequireSchoolsRead(auth_user): RequireSchoolsRead,
    filters: Result<Query<SchoolFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedSchools>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let scope = resource_scope(&auth_user)?;

    let schools = SchoolService::list(&state.db, scope, filters).await?;
    Ok(Json(schools))
}

pub async fn get_school(
    State(state): State<AppState>,
    RequireSchoolsRead(auth_user): RequireSchoolsRead,
    Path(id): Path<SchoolId>,
) -> Result<Json<School>, AppError> {
    ensure_school_access(&auth_user, id)?;
    let school = SchoolService::get(&state.db, id).await?;
    Ok(Json(school))
}

pub async fn update_school(
    State(state): State<AppState>,
    RequireSchoolsUpdate(auth_user): RequireSchoolsUpdate,
    headers: HeaderMap,
    Path(id): Path<SchoolId>,
    ValidatedJson(dto): ValidatedJson<UpdateSchoolDto>,
) -> Result<Json<School>, AppError> {
    ensure_school_access(&auth_user, id)?;
    let before = SchoolService::get(&state.db, id).await?;
    let school = SchoolService::update(&state.db, id, dto).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Update, "school", id)
            .old(&before)
            .new_values(&school),
    )
    .await;
    Ok(Json(school))
}

pub async fn delete_school(
    State(state): State<AppState>,
    RequireSchoolsDelete(auth_user): RequireSchoolsDelete,
    headers: HeaderMap,
    Path(id): Path<SchoolId>,
) -> Result<StatusCode, AppError> {
    let before = SchoolService::get(&state.db, id).await?;
    SchoolService::delete(&state.db, id).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "school", id).old(&before),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolhub_auth::Claims;
    use schoolhub_models::Role;
    use uuid::Uuid;

    fn user(role: Role, school_id: Option<Uuid>) -> AuthUser {
        AuthUser(Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@example.com".into(),
            school_id,
            role: role.as_str().into(),
            permissions: role.permissions(),
            iss: "schoolhub".into(),
            exp: 9_999_999_999,
            iat: 0,
        })
    }

    #[test]
    fn test_school_admin_limited_to_own_school() {
        let own = Uuid::new_v4();
        let admin = user(Role::Admin, Some(own));
        assert!(ensure_school_access(&admin, SchoolId::from(own)).is_ok());
        assert_eq!(
            ensure_school_access(&admin, SchoolId::new()).unwrap_err().status,
            StatusCode::FORBIDDEN
        );

        let sysadmin = user(Role::SystemAdmin, None);
        assert!(ensure_school_access(&sysadmin, SchoolId::new()).is_ok());
    }
}
