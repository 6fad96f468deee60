//! Student enrollments in courses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{CourseId, EnrollmentId, SchoolId, SemesterId, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Dropped,
    Completed,
    Withdrawn,
}

impl EnrollmentStatus {
    /// Dropped and withdrawn rows may be reactivated by a new enrollment.
    pub fn is_reopenable(&self) -> bool {
        matches!(self, Self::Dropped | Self::Withdrawn)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub semester_id: Option<SemesterId>,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub dropped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub final_score: Option<f64>,
    pub final_letter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ENROLLMENT_COLUMNS: &str = "id, school_id, student_id, course_id, semester_id, status, \
     enrolled_at, dropped_at, completed_at, final_score, final_letter, created_at, updated_at";

/// An enrollment with the course details a student cares about.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentCourse {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    pub credit_hours: i32,
    pub semester_id: Option<SemesterId>,
    pub status: EnrollmentStatus,
    pub final_score: Option<f64>,
    pub final_letter: Option<String>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEnrollmentDto {
    pub student_id: StudentId,
    pub course_id: CourseId,
    /// Defaults to the course's semester.
    pub semester_id: Option<SemesterId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompleteEnrollmentDto {
    /// Overrides the score computed from recorded grades.
    #[validate(range(min = 0.0, max = 100.0))]
    pub final_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub student_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub semester_id: Option<Uuid>,
    pub status: Option<EnrollmentStatus>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dropped_and_withdrawn_reopen() {
        assert!(EnrollmentStatus::Dropped.is_reopenable());
        assert!(EnrollmentStatus::Withdrawn.is_reopenable());
        assert!(!EnrollmentStatus::Active.is_reopenable());
        assert!(!EnrollmentStatus::Completed.is_reopenable());
    }

    #[test]
    fn test_final_score_override_range() {
        let dto = CompleteEnrollmentDto {
            final_score: Some(101.0),
        };
        assert!(dto.validate().is_err());
    }
}
