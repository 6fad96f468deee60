use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use schoolhub_auth::{Claims, verify_token};
use schoolhub_core::AppError;
use schoolhub_core::permissions as perm;
use schoolhub_models::Role;
use schoolhub_models::ids::{SchoolId, UserId};

use crate::state::AppState;

/// Verified bearer token claims.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.0.permissions.iter().any(|p| p == permission)
    }

    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has_permission(p))
    }

    /// `None` for system admins.
    pub fn school_id(&self) -> Option<SchoolId> {
        self.0.school_id.map(SchoolId::from)
    }

    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.0
            .sub
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid user ID in token"))
    }

    pub fn role(&self) -> Result<Role, AppError> {
        self.0
            .role
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid role in token"))
    }

    pub fn is_system_admin(&self) -> bool {
        self.0.is_system_admin()
    }

    pub fn is_student(&self) -> bool {
        self.0.role == Role::Student.as_str()
    }

    pub fn is_teacher(&self) -> bool {
        self.0.role == Role::Teacher.as_str()
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }
}

/// Reads `Authorization: Bearer <jwt>`.
pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header format"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = verify_token(token, &state.jwt_config)?;
        Ok(AuthUser(claims))
    }
}

/// Declares an extractor that authenticates and then requires one
/// permission, answering 403 without it.
#[macro_export]
macro_rules! require_permission {
    ($name:ident, $permission:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub $crate::middleware::auth::AuthUser);

        impl axum::extract::FromRequestParts<$crate::state::AppState> for $name {
            type Rejection = schoolhub_core::AppError;

            async fn from_request_parts(
                parts: &mut axum::http::request::Parts,
                state: &$crate::state::AppState,
            ) -> Result<Self, Self::Rejection> {
                let auth_user =
                    $crate::middleware::auth::AuthUser::from_request_parts(parts, state).await?;

                if !auth_user.has_permission($permission) {
                    return Err(schoolhub_core::AppError::forbidden(format!(
                        "Access denied. Missing required permission: {}",
                        $permission
                    )));
                }

                Ok($name(auth_user))
            }
        }
    };
}

require_permission!(RequireUsersCreate, perm::USERS_CREATE);
require_permission!(RequireUsersRead, perm::USERS_READ);
require_permission!(RequireUsersUpdate, perm::USERS_UPDATE);
require_permission!(RequireUsersDelete, perm::USERS_DELETE);

require_permission!(RequireSchoolsCreate, perm::SCHOOLS_CREATE);
require_permission!(RequireSchoolsRead, perm::SCHOOLS_READ);
require_permission!(RequireSchoolsUpdate, perm::SCHOOLS_UPDATE);
require_permission!(RequireSchoolsDelete, perm::SCHOOLS_DELETE);

require_permission!(RequireStudentsCreate, perm::STUDENTS_CREATE);
require_permission!(RequireStudentsRead, perm::STUDENTS_READ);
require_permission!(RequireStudentsUpdate, perm::STUDENTS_UPDATE);
require_permission!(RequireStudentsDelete, perm::STUDENTS_DELETE);

require_permission!(RequireTeachersCreate, perm::TEACHERS_CREATE);
require_permission!(RequireTeachersRead, perm::TEACHERS_READ);
require_permission!(RequireTeachersUpdate, perm::TEACHERS_UPDATE);
require_permission!(RequireTeachersDelete, perm::TEACHERS_DELETE);

require_permission!(RequireDepartmentsCreate, perm::DEPARTMENTS_CREATE);
require_permission!(RequireDepartmentsRead, perm::DEPARTMENTS_READ);
require_permission!(RequireDepartmentsUpdate, perm::DEPARTMENTS_UPDATE);
require_permission!(RequireDepartmentsDelete, perm::DEPARTMENTS_DELETE);

require_permission!(RequireSemestersCreate, perm::SEMESTERS_CREATE);
require_permission!(RequireSemestersRead, perm::SEMESTERS_READ);
require_permission!(RequireSemestersUpdate, perm::SEMESTERS_UPDATE);
require_permission!(RequireSemestersDelete, perm::SEMESTERS_DELETE);

require_permission!(RequireCoursesCreate, perm::COURSES_CREATE);
require_permission!(RequireCoursesRead, perm::COURSES_READ);
require_permission!(RequireCoursesUpdate, perm::COURSES_UPDATE);
require_permission!(RequireCoursesDelete, perm::COURSES_DELETE);

require_permission!(RequireEnrollmentsCreate, perm::ENROLLMENTS_CREATE);
require_permission!(RequireEnrollmentsRead, perm::ENROLLMENTS_READ);
require_permission!(RequireEnrollmentsUpdate, perm::ENROLLMENTS_UPDATE);

require_permission!(RequireGradesCreate, perm::GRADES_CREATE);
require_permission!(RequireGradesRead, perm::GRADES_READ);
require_permission!(RequireGradesUpdate, perm::GRADES_UPDATE);
require_permission!(RequireGradesDelete, perm::GRADES_DELETE);

require_permission!(RequireAssignmentsCreate, perm::ASSIGNMENTS_CREATE);
require_permission!(RequireAssignmentsRead, perm::ASSIGNMENTS_READ);
require_permission!(RequireAssignmentsUpdate, perm::ASSIGNMENTS_UPDATE);
require_permission!(RequireAssignmentsDelete, perm::ASSIGNMENTS_DELETE);
require_permission!(RequireSubmissionsCreate, perm::SUBMISSIONS_CREATE);
require_permission!(RequireSubmissionsGrade, perm::SUBMISSIONS_GRADE);

require_permission!(RequireAttendanceRecord, perm::ATTENDANCE_RECORD);
require_permission!(RequireAttendanceRead, perm::ATTENDANCE_READ);

require_permission!(RequireSchedulesCreate, perm::SCHEDULES_CREATE);
require_permission!(RequireSchedulesRead, perm::SCHEDULES_READ);
require_permission!(RequireSchedulesUpdate, perm::SCHEDULES_UPDATE);
require_permission!(RequireSchedulesDelete, perm::SCHEDULES_DELETE);

require_permission!(RequireDocumentsUpload, perm::DOCUMENTS_UPLOAD);
require_permission!(RequireDocumentsRead, perm::DOCUMENTS_READ);
require_permission!(RequireDocumentsDelete, perm::DOCUMENTS_DELETE);

require_permission!(RequireNotificationsSend, perm::NOTIFICATIONS_SEND);

require_permission!(RequireAuditRead, perm::AUDIT_READ);

require_permission!(RequireReportsView, perm::REPORTS_VIEW);
require_permission!(RequireReportsExport, perm::REPORTS_EXPORT);

require_permission!(RequireSettingsRead, perm::SETTINGS_READ);
require_permission!(RequireSettingsUpdate, perm::SETTINGS_UPDATE);

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn claims(role: Role, school_id: Option<Uuid>) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            school_id,
            role: role.as_str().to_string(),
            permissions: role.permissions(),
            iss: "schoolhub".to_string(),
            exp: 9_999_999_999,
            iat: 1_234_567_890,
        }
    }

    #[test]
    fn test_permissions_follow_role() {
        let teacher = AuthUser(claims(Role::Teacher, Some(Uuid::new_v4())));
        assert!(teacher.has_permission(perm::GRADES_CREATE));
        assert!(!teacher.has_permission(perm::STUDENTS_CREATE));
        assert!(teacher.has_any_permission(&[perm::STUDENTS_CREATE, perm::COURSES_READ]));
        assert!(teacher.is_teacher());
        assert!(!teacher.is_student());
    }

    #[test]
    fn test_ids_and_role_parse() {
        let school = Uuid::new_v4();
        let c = claims(Role::Admin, Some(school));
        let sub: Uuid = c.sub.parse().unwrap();
        let user = AuthUser(c);

        assert_eq!(user.user_id().unwrap(), UserId::from(sub));
        assert_eq!(user.school_id(), Some(SchoolId::from(school)));
        assert_eq!(user.role().unwrap(), Role::Admin);
    }

    #[test]
    fn test_bad_subject_is_unauthorized() {
        let mut c = claims(Role::Student, Some(Uuid::new_v4()));
        c.sub = "not-a-uuid".to_string();
        let err = AuthUser(c).user_id().unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_system_admin_has_no_school() {
        let admin = AuthUser(claims(Role::SystemAdmin, None));
        assert!(admin.is_system_admin());
        assert_eq!(admin.school_id(), None);
    }
}
