//! User accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::permissions;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{SchoolId, UserId};

/// Fixed roles. Stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SystemAdmin,
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn permissions(&self) -> Vec<String> {
        permissions::for_role(self.as_str())
    }

    /// Roles a caller with `self` may create through the users endpoint.
    /// Students and teachers get profiles through their own endpoints.
    pub fn can_create(&self, target: Role) -> bool {
        match self {
            Role::SystemAdmin => matches!(target, Role::Admin),
            Role::Admin => matches!(target, Role::Admin),
            _ => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_admin" => Ok(Role::SystemAdmin),
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Public view of a user row. Never carries secrets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub school_id: Option<SchoolId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Columns selected for [`User`].
pub const USER_COLUMNS: &str = "id, school_id, first_name, last_name, email, role, phone, is_active, \
     mfa_enabled, last_login_at, locked_until, created_at, updated_at";

/// Everything the login flow needs, including the password hash.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: UserId,
    pub school_id: Option<SchoolId>,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub mfa_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    /// Required when a system admin creates the user.
    pub school_id: Option<SchoolId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserFilterParams {
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Profile fields shared by the student and teacher create DTOs.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::SystemAdmin, Role::Admin, Role::Teacher, Role::Student] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("principal".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&Role::SystemAdmin).unwrap(), r#""system_admin""#);
        let role: Role = serde_json::from_str(r#""teacher""#).unwrap();
        assert_eq!(role, Role::Teacher);
    }

    #[test]
    fn test_who_can_create_whom() {
        assert!(Role::SystemAdmin.can_create(Role::Admin));
        assert!(Role::Admin.can_create(Role::Admin));
        assert!(!Role::Admin.can_create(Role::SystemAdmin));
        assert!(!Role::Teacher.can_create(Role::Admin));
        assert!(!Role::SystemAdmin.can_create(Role::Student));
    }

    #[test]
    fn test_create_user_dto_validation() {
        let dto = CreateUserDto {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@school.edu".into(),
            password: "password123".into(),
            role: Role::Admin,
            phone: None,
            school_id: None,
        };
        assert!(dto.validate().is_ok());

        let bad = CreateUserDto {
            email: "not-an-email".into(),
            password: "short".into(),
            ..dto
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
