//! Tenant scoping shared by the feature services.
//!
//! System admins carry no school in their token and may act on any school;
//! everyone else is pinned to the school in their claims.

use anyhow::anyhow;
use axum::http::HeaderMap;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::ids::{SchoolId, StudentId, TeacherId, UserId};
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::middleware::rate_limit::forwarded_ip;

fn own_school(auth: &AuthUser) -> Result<SchoolId, AppError> {
    auth.school_id()
        .ok_or_else(|| AppError::forbidden("User must be associated with a school"))
}

/// School for create operations. System admins must name one; anyone else
/// gets their own school and a different `specified` is ignored.
pub fn scoped_school_id(
    auth: &AuthUser,
    specified: Option<SchoolId>,
) -> Result<SchoolId, AppError> {
    if auth.is_system_admin() {
        return specified.ok_or_else(|| {
            AppError::bad_request(anyhow!(
                "System admin must specify school_id for this operation"
            ))
        });
    }
    own_school(auth)
}

/// Row filter for reads and writes of existing resources. `None` means
/// unrestricted (system admin).
pub fn resource_scope(auth: &AuthUser) -> Result<Option<SchoolId>, AppError> {
    if auth.is_system_admin() {
        return Ok(None);
    }
    own_school(auth).map(Some)
}

/// Row filter for list endpoints. System admins may narrow to one school via
/// the `school_id` query parameter.
pub fn list_scope(auth: &AuthUser, requested: Option<Uuid>) -> Result<Option<SchoolId>, AppError> {
    if auth.is_system_admin() {
        return Ok(requested.map(SchoolId::from));
    }
    own_school(auth).map(Some)
}

pub async fn student_id_for_user(
    db: &PgPool,
    user_id: UserId,
) -> Result<Option<StudentId>, AppError> {
    let id = sqlx::query_scalar::<_, StudentId>(
        "SELECT id FROM students WHERE user_id = $1 AND is_deleted = FALSE",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(id)
}

pub async fn teacher_id_for_user(
    db: &PgPool,
    user_id: UserId,
) -> Result<Option<TeacherId>, AppError> {
    let id = sqlx::query_scalar::<_, TeacherId>(
        "SELECT id FROM teachers WHERE user_id = $1 AND is_deleted = FALSE",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(id)
}

/// The caller's own student profile. 403 for accounts without one.
pub async fn require_own_student_id(db: &PgPool, auth: &AuthUser) -> Result<StudentId, AppError> {
    student_id_for_user(db, auth.user_id()?)
        .await?
        .ok_or_else(|| AppError::forbidden("No student profile is linked to this account"))
}

/// Students may only see their own records; staff pass through.
pub async fn ensure_student_access(
    db: &PgPool,
    auth: &AuthUser,
    student_id: StudentId,
) -> Result<(), AppError> {
    if !auth.is_student() {
        return Ok(());
    }
    if require_own_student_id(db, auth).await? != student_id {
        return Err(AppError::forbidden("Students may only access their own records"));
    }
    Ok(())
}

/// For students, forces a list filter onto their own profile.
pub async fn restrict_student_filter(
    db: &PgPool,
    auth: &AuthUser,
    requested: Option<Uuid>,
) -> Result<Option<Uuid>, AppError> {
    if !auth.is_student() {
        return Ok(requested);
    }
    let own = require_own_student_id(db, auth).await?;
    match requested {
        Some(id) if id != own.into_inner() => Err(AppError::forbidden(
            "Students may only access their own records",
        )),
        _ => Ok(Some(own.into_inner())),
    }
}

/// Teachers may only manage courses assigned to them; admins pass through.
pub async fn ensure_course_staff(
    db: &PgPool,
    auth: &AuthUser,
    course_teacher: Option<TeacherId>,
) -> Result<(), AppError> {
    if !auth.is_teacher() {
        return Ok(());
    }
    let own = teacher_id_for_user(db, auth.user_id()?).await?;
    if own.is_none() || own != course_teacher {
        return Err(AppError::forbidden("Only the course's teacher may do this"));
    }
    Ok(())
}

/// Client address recorded in audit entries.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    forwarded_ip(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolhub_auth::Claims;
    use schoolhub_models::Role;

    fn user(role: Role, school_id: Option<Uuid>) -> AuthUser {
        AuthUser(Claims {
            sub: Uuid::new_v4().to_string(),
            email: "x@example.com".to_string(),
            school_id,
            role: role.as_str().to_string(),
            permissions: role.permissions(),
            iss: "schoolhub".to_string(),
            exp: 9_999_999_999,
            iat: 0,
        })
    }

    #[test]
    fn test_system_admin_must_name_a_school() {
        let admin = user(Role::SystemAdmin, None);
        assert!(scoped_school_id(&admin, None).is_err());

        let school = SchoolId::new();
        assert_eq!(scoped_school_id(&admin, Some(school)).unwrap(), school);
        assert_eq!(resource_scope(&admin).unwrap(), None);
        assert_eq!(list_scope(&admin, Some(school.into_inner())).unwrap(), Some(school));
    }

    #[test]
    fn test_school_users_are_pinned_to_their_school() {
        let own = Uuid::new_v4();
        let admin = user(Role::Admin, Some(own));
        let other = SchoolId::new();

        assert_eq!(scoped_school_id(&admin, Some(other)).unwrap(), SchoolId::from(own));
        assert_eq!(resource_scope(&admin).unwrap(), Some(SchoolId::from(own)));
        assert_eq!(
            list_scope(&admin, Some(other.into_inner())).unwrap(),
            Some(SchoolId::from(own))
        );
    }

    #[test]
    fn test_school_user_without_school_is_forbidden() {
        let teacher = user(Role::Teacher, None);
        let err = resource_scope(&teacher).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_client_ip_omits_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
