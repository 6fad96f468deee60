//! Report shapes. Row types double as CSV records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use schoolhub_core::serde::deserialize_optional_uuid;

use crate::attendance::AttendanceCounts;
use crate::enrollments::EnrollmentStatus;
use crate::ids::{CourseId, SemesterId, StudentId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptRow {
    pub semester_name: Option<String>,
    pub course_code: String,
    pub course_name: String,
    pub credit_hours: i32,
    pub status: EnrollmentStatus,
    pub final_score: Option<f64>,
    pub final_letter: Option<String>,
    #[sqlx(default)]
    pub grade_points: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub student_id: StudentId,
    pub student_number: String,
    pub student_name: String,
    pub gpa: f64,
    pub total_credits: i64,
    pub courses: Vec<TranscriptRow>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseGradeReportRow {
    pub student_id: StudentId,
    pub student_number: String,
    pub student_name: String,
    pub grade_count: i64,
    pub weighted_average: Option<f64>,
    #[sqlx(default)]
    pub letter_grade: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseGradeReport {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    pub class_average: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    /// Letter -> number of students.
    pub distribution: Vec<(String, usize)>,
    pub students: Vec<CourseGradeReportRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceReportRow {
    pub student_id: StudentId,
    pub student_number: String,
    pub student_name: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    #[sqlx(default)]
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseAttendanceReport {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    pub overall_rate: f64,
    pub students: Vec<AttendanceReportRow>,
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct DashboardStats {
    pub total_students: i64,
    pub active_students: i64,
    pub total_teachers: i64,
    pub total_courses: i64,
    pub active_enrollments: i64,
    pub departments: i64,
    #[sqlx(default)]
    pub current_semester_id: Option<SemesterId>,
    #[sqlx(default)]
    pub average_attendance_rate: f64,
}

/// CSV line for a roster export.
#[derive(Debug, Clone, Serialize)]
pub struct RosterCsvRow<'a> {
    pub student_number: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub enrolled_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
}
