//! Teacher profiles.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{DepartmentId, SchoolId, TeacherId, UserId};
use crate::users::NewAccount;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Teacher {
    pub id: TeacherId,
    pub user_id: UserId,
    pub school_id: SchoolId,
    pub employee_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub hire_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const TEACHER_SELECT: &str = r#"
    SELECT t.id, t.user_id, t.school_id, t.employee_number,
           u.first_name, u.last_name, u.email, u.phone,
           t.department_id, t.specialization, t.qualification, t.hire_date,
           t.created_at, t.updated_at
    FROM teachers t
    JOIN users u ON u.id = t.user_id
"#;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTeacherDto {
    #[serde(flatten)]
    #[validate(nested)]
    pub account: NewAccount,
    #[validate(length(min = 1, max = 50))]
    pub employee_number: String,
    pub department_id: Option<DepartmentId>,
    #[validate(length(max = 150))]
    pub specialization: Option<String>,
    #[validate(length(max = 150))]
    pub qualification: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub school_id: Option<SchoolId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTeacherDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub department_id: Option<DepartmentId>,
    #[validate(length(max = 150))]
    pub specialization: Option<String>,
    #[validate(length(max = 150))]
    pub qualification: Option<String>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeacherFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub department_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_number_required() {
        let dto: CreateTeacherDto = serde_json::from_value(serde_json::json!({
            "first_name": "Alan",
            "last_name": "Turing",
            "email": "alan@school.edu",
            "password": "password123",
            "employee_number": ""
        }))
        .unwrap();
        assert!(dto.validate().is_err());
    }
}
