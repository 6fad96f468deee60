//! Grade entries and computed summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{CourseId, EnrollmentId, GradeId, SchoolId, StudentId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Grade {
    pub id: GradeId,
    pub school_id: SchoolId,
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub grade_type: String,
    pub title: String,
    pub score: f64,
    pub weight: f64,
    pub letter_grade: String,
    pub comments: Option<String>,
    pub graded_by: Option<UserId>,
    pub graded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const GRADE_COLUMNS: &str = "id, school_id, enrollment_id, student_id, course_id, grade_type, \
     title, score, weight, letter_grade, comments, graded_by, graded_at, created_at, updated_at";

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateGradeDto {
    pub enrollment_id: EnrollmentId,
    /// exam, quiz, homework, project, ...
    #[validate(length(min = 1, max = 30))]
    pub grade_type: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Range checked by the service so it answers 400 like other rule
    /// violations.
    pub score: f64,
    #[serde(default = "default_weight")]
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub weight: f64,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkCreateGradesDto {
    #[validate(length(min = 1, max = 500), nested)]
    pub grades: Vec<CreateGradeDto>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateGradeDto {
    #[validate(length(min = 1, max = 30))]
    pub grade_type: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub score: Option<f64>,
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub weight: Option<f64>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradeFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub student_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub enrollment_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub grade_type: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// A student's standing in one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseGradeSummary {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub grade_count: usize,
    /// `None` until at least one grade is recorded.
    pub weighted_average: Option<f64>,
    pub letter_grade: Option<String>,
    pub grade_points: Option<f64>,
    pub grades: Vec<Grade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(score: f64) -> serde_json::Value {
        serde_json::json!({
            "enrollment_id": Uuid::new_v4(),
            "grade_type": "exam",
            "title": "Midterm",
            "score": score
        })
    }

    #[test]
    fn test_weight_defaults_to_one() {
        let dto: CreateGradeDto = serde_json::from_value(grade(88.0)).unwrap();
        assert_eq!(dto.weight, 1.0);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_zero_weight_is_invalid() {
        let mut dto: CreateGradeDto = serde_json::from_value(grade(75.0)).unwrap();
        dto.weight = 0.0;
        assert!(dto.validate().unwrap_err().field_errors().contains_key("weight"));
    }

    #[test]
    fn test_bulk_validates_every_entry() {
        let mut dto: BulkCreateGradesDto = serde_json::from_value(serde_json::json!({
            "grades": [grade(90.0), grade(80.0)]
        }))
        .unwrap();
        dto.grades[1].title = String::new();
        assert!(dto.validate().is_err());

        let empty = BulkCreateGradesDto { grades: vec![] };
        assert!(empty.validate().is_err());
    }
}
