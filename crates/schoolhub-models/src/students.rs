//! Student profiles. Each student owns exactly one `student` user account.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{DepartmentId, SchoolId, StudentId, UserId};
use crate::users::NewAccount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "student_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Suspended,
    Graduated,
    Withdrawn,
}

/// A student row joined with its user account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    pub school_id: SchoolId,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub enrollment_date: NaiveDate,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// `SELECT ... FROM students s JOIN users u` prefix producing [`Student`] rows.
pub const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.school_id, s.student_number,
           u.first_name, u.last_name, u.email, u.phone,
           s.department_id, s.date_of_birth, s.gender, s.address,
           s.guardian_name, s.guardian_phone, s.enrollment_date, s.status,
           s.created_at, s.updated_at
    FROM students s
    JOIN users u ON u.id = s.user_id
"#;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStudentDto {
    #[serde(flatten)]
    #[validate(nested)]
    pub account: NewAccount,
    #[validate(length(min = 1, max = 50))]
    pub student_number: String,
    pub department_id: Option<DepartmentId>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 200))]
    pub guardian_name: Option<String>,
    #[validate(length(max = 50))]
    pub guardian_phone: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
    /// Required when a system admin creates the student.
    pub school_id: Option<SchoolId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStudentDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 200))]
    pub guardian_name: Option<String>,
    #[validate(length(max = 50))]
    pub guardian_phone: Option<String>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    pub status: Option<StudentStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub department_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentGpaResponse {
    pub student_id: StudentId,
    pub gpa: f64,
    pub total_credits: i64,
    pub courses_counted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> CreateStudentDto {
        serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@school.edu",
            "password": "password123",
            "student_number": "S-0001",
            "date_of_birth": "2008-12-10"
        }))
        .unwrap()
    }

    #[test]
    fn test_create_student_flattens_account_fields() {
        let dto = dto();
        assert_eq!(dto.account.email, "ada@school.edu");
        assert_eq!(dto.student_number, "S-0001");
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_nested_account_errors_surface() {
        let mut dto = dto();
        dto.account.email = "bad".into();
        dto.student_number = String::new();
        let err = dto.validate().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("email"));
        assert!(text.contains("student_number"));
    }

    #[test]
    fn test_gpa_response_reads_back_from_cache_json() {
        let cached = serde_json::json!({
            "student_id": uuid::Uuid::nil(),
            "gpa": 3.67,
            "total_credits": 9,
            "courses_counted": 3
        });
        let gpa: StudentGpaResponse = serde_json::from_value(cached).unwrap();
        assert_eq!(gpa.gpa, 3.67);
        assert_eq!(gpa.courses_counted, 3);
    }

    #[test]
    fn test_status_uses_snake_case() {
        let status: StudentStatus = serde_json::from_str(r#""graduated""#).unwrap();
        assert_eq!(status, StudentStatus::Graduated);
    }
}
