//! Courses offered by a school.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{CourseId, DepartmentId, EnrollmentId, SchoolId, SemesterId, StudentId, TeacherId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: CourseId,
    pub school_id: SchoolId,
    pub department_id: Option<DepartmentId>,
    pub teacher_id: Option<TeacherId>,
    pub semester_id: Option<SemesterId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub credit_hours: i32,
    pub max_capacity: i32,
    pub is_active: bool,
    /// Active enrollments at read time.
    pub enrolled_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn seats_left(&self) -> i64 {
        (i64::from(self.max_capacity) - self.enrolled_count).max(0)
    }
}

pub const COURSE_SELECT: &str = r#"
    SELECT c.id, c.school_id, c.department_id, c.teacher_id, c.semester_id,
           c.code, c.name, c.description, c.credit_hours, c.max_capacity, c.is_active,
           (SELECT COUNT(*) FROM enrollments e
             WHERE e.course_id = c.id AND e.status = 'active' AND e.is_deleted = FALSE) AS enrolled_count,
           c.created_at, c.updated_at
    FROM courses c
"#;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCourseDto {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub credit_hours: i32,
    #[validate(range(min = 1))]
    pub max_capacity: i32,
    pub department_id: Option<DepartmentId>,
    pub teacher_id: Option<TeacherId>,
    pub semester_id: Option<SemesterId>,
    pub school_id: Option<SchoolId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCourseDto {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub credit_hours: Option<i32>,
    #[validate(range(min = 1))]
    pub max_capacity: Option<i32>,
    pub department_id: Option<DepartmentId>,
    pub teacher_id: Option<TeacherId>,
    pub semester_id: Option<SemesterId>,
    pub is_active: Option<bool>,
}

impl UpdateCourseDto {
    /// Credit weight feeds every enrolled student's GPA.
    pub fn changes_credits(&self, current: i32) -> bool {
        self.credit_hours.is_some_and(|credits| credits != current)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub department_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub teacher_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub semester_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// One line of a course roster.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RosterEntry {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_hours_bounds() {
        let dto: CreateCourseDto = serde_json::from_value(serde_json::json!({
            "code": "MATH101",
            "name": "Calculus I",
            "credit_hours": 11,
            "max_capacity": 0
        }))
        .unwrap();
        let err = dto.validate().unwrap_err();
        assert!(err.field_errors().contains_key("credit_hours"));
        assert!(err.field_errors().contains_key("max_capacity"));
    }

    #[test]
    fn test_changes_credits_only_on_new_value() {
        let update = |body| serde_json::from_value::<UpdateCourseDto>(body).unwrap();
        assert!(update(serde_json::json!({ "credit_hours": 4 })).changes_credits(3));
        assert!(!update(serde_json::json!({ "credit_hours": 3 })).changes_credits(3));
        assert!(!update(serde_json::json!({ "name": "Calculus II" })).changes_credits(3));
    }

    #[test]
    fn test_seats_left_never_negative() {
        let course = Course {
            id: CourseId::new(),
            school_id: SchoolId::new(),
            department_id: None,
            teacher_id: None,
            semester_id: None,
            code: "BIO".into(),
            name: "Biology".into(),
            description: None,
            credit_hours: 3,
            max_capacity: 2,
            is_active: true,
            enrolled_count: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(course.seats_left(), 0);
    }
}
