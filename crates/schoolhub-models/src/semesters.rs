//! Academic semesters. At most one per school is current.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{SchoolId, SemesterId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Semester {
    pub id: SemesterId,
    pub school_id: SchoolId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_date_range(dto: &CreateSemesterDto) -> Result<(), ValidationError> {
    if dto.start_date >= dto.end_date {
        let mut err = ValidationError::new("date_range");
        err.message = Some("start_date must be before end_date".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_date_range"))]
pub struct CreateSemesterDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_current: bool,
    pub school_id: Option<SchoolId>,
}

/// Partial update; the merged range is checked by the service.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSemesterDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemesterFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_start_must_precede_end() {
        let mut dto = CreateSemesterDto {
            name: "Fall 2026".into(),
            start_date: date(2026, 9, 1),
            end_date: date(2026, 12, 20),
            is_current: false,
            school_id: None,
        };
        assert!(dto.validate().is_ok());

        dto.end_date = dto.start_date;
        assert!(dto.validate().is_err());
    }
}
