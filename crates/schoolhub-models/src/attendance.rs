//! Daily attendance per student and course.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{AttendanceId, CourseId, SchoolId, StudentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: AttendanceId,
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ATTENDANCE_COLUMNS: &str =
    "id, school_id, student_id, course_id, date, status, remarks, recorded_by, created_at, updated_at";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordAttendanceDto {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkAttendanceEntry {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

/// One course, one day, many students.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkRecordAttendanceDto {
    pub course_id: CourseId,
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 500), nested)]
    pub records: Vec<BulkAttendanceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub student_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    pub status: Option<AttendanceStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceSummaryParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub student_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AttendanceCounts {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
}

impl AttendanceCounts {
    pub fn total(&self) -> i64 {
        self.present + self.absent + self.late + self.excused
    }

    /// `(present + late) / total * 100`, two decimals; 0 with no records.
    pub fn rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let rate = (self.present + self.late) as f64 / total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub student_id: Option<StudentId>,
    pub course_id: Option<CourseId>,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    pub total: i64,
    pub attendance_rate: f64,
}

impl AttendanceSummary {
    pub fn new(student_id: Option<StudentId>, course_id: Option<CourseId>, counts: AttendanceCounts) -> Self {
        Self {
            student_id,
            course_id,
            total: counts.total(),
            attendance_rate: counts.rate(),
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_counts_late_as_attended() {
        let counts = AttendanceCounts {
            present: 6,
            absent: 2,
            late: 1,
            excused: 1,
        };
        assert_eq!(counts.total(), 10);
        assert_eq!(counts.rate(), 70.0);
    }

    #[test]
    fn test_rate_rounds_to_two_decimals() {
        let counts = AttendanceCounts {
            present: 1,
            absent: 2,
            ..Default::default()
        };
        assert_eq!(counts.rate(), 33.33);
    }

    #[test]
    fn test_bulk_entries_are_validated() {
        let dto: BulkRecordAttendanceDto = serde_json::from_value(serde_json::json!({
            "course_id": uuid::Uuid::new_v4(),
            "date": "2025-03-10",
            "records": [
                { "student_id": uuid::Uuid::new_v4(), "status": "present" },
                { "student_id": uuid::Uuid::new_v4(), "status": "late", "remarks": "x".repeat(501) }
            ]
        }))
        .unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_empty_rate_is_zero() {
        assert_eq!(AttendanceCounts::default().rate(), 0.0);
    }

    #[test]
    fn test_summary_serializes_counts_inline() {
        let summary = AttendanceSummary::new(
            None,
            None,
            AttendanceCounts {
                present: 3,
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["present"], 3);
        assert_eq!(json["attendance_rate"], 100.0);
    }
}
