//! Course assignments and student submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{AssignmentId, CourseId, DocumentId, SchoolId, StudentId, SubmissionId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: AssignmentId,
    pub school_id: SchoolId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub max_score: f64,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ASSIGNMENT_COLUMNS: &str = "id, school_id, course_id, title, description, due_date, \
     max_score, created_by, created_at, updated_at";

fn default_max_score() -> f64 {
    100.0
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssignmentDto {
    pub course_id: CourseId,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default = "default_max_score")]
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub max_score: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAssignmentDto {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: SubmissionId,
    pub assignment_id: AssignmentId,
    pub student_id: StudentId,
    pub content: Option<String>,
    pub document_id: Option<DocumentId>,
    pub submitted_at: DateTime<Utc>,
    pub is_late: bool,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<UserId>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const SUBMISSION_COLUMNS: &str = "id, assignment_id, student_id, content, document_id, \
     submitted_at, is_late, score, feedback, graded_by, graded_at, created_at, updated_at";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAssignmentDto {
    /// Required when a staff member submits on a student's behalf.
    pub student_id: Option<StudentId>,
    #[validate(length(max = 20000))]
    pub content: Option<String>,
    pub document_id: Option<DocumentId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GradeSubmissionDto {
    #[validate(range(min = 0.0))]
    pub score: f64,
    pub feedback: Option<String>,
}

/// A submission is late when it arrives after the due date.
pub fn is_late(due_date: DateTime<Utc>, submitted_at: DateTime<Utc>) -> bool {
    submitted_at > due_date
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_late_only_after_due_date() {
        let due = Utc::now();
        assert!(!is_late(due, due));
        assert!(!is_late(due, due - Duration::minutes(1)));
        assert!(is_late(due, due + Duration::seconds(1)));
    }

    #[test]
    fn test_max_score_defaults_to_hundred() {
        let dto: CreateAssignmentDto = serde_json::from_value(serde_json::json!({
            "course_id": Uuid::new_v4(),
            "title": "Essay",
            "due_date": "2026-11-01T23:59:00Z"
        }))
        .unwrap();
        assert_eq!(dto.max_score, 100.0);
        assert!(dto.validate().is_ok());
    }
}
