//! Weekly class schedule slots.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{CourseId, ScheduleId, SchoolId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: ScheduleId,
    pub school_id: SchoolId,
    pub course_id: CourseId,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const SCHEDULE_COLUMNS: &str =
    "id, school_id, course_id, day_of_week, start_time, end_time, room, created_at, updated_at";

fn validate_time_range(dto: &CreateScheduleDto) -> Result<(), ValidationError> {
    if dto.start_time >= dto.end_time {
        let mut err = ValidationError::new("time_range");
        err.message = Some("start_time must be before end_time".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_time_range"))]
pub struct CreateScheduleDto {
    pub course_id: CourseId,
    #[validate(range(min = 0, max = 6))]
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(length(min = 1, max = 50))]
    pub room: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateScheduleDto {
    #[validate(range(min = 0, max = 6))]
    pub day_of_week: Option<i16>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[validate(length(min = 1, max = 50))]
    pub room: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub teacher_id: Option<Uuid>,
    pub day_of_week: Option<i16>,
}

/// Half-open intervals: a slot ending at 10:00 does not clash with one
/// starting at 10:00.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_overlap_rules() {
        assert!(overlaps(t(9, 0), t(10, 0), t(9, 30), t(11, 0)));
        assert!(overlaps(t(9, 0), t(12, 0), t(10, 0), t(11, 0)));
        assert!(!overlaps(t(9, 0), t(10, 0), t(10, 0), t(11, 0)));
        assert!(!overlaps(t(13, 0), t(14, 0), t(9, 0), t(10, 0)));
    }

    #[test]
    fn test_day_and_time_validation() {
        let dto = CreateScheduleDto {
            course_id: CourseId::new(),
            day_of_week: 7,
            start_time: t(11, 0),
            end_time: t(10, 0),
            room: Some("B12".into()),
        };
        let err = dto.validate().unwrap_err();
        assert!(err.field_errors().contains_key("day_of_week"));
        assert!(err.field_errors().contains_key("__all__"));
    }
}
