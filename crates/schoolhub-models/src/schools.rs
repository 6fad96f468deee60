//! Schools (tenants).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::deserialize_optional_string;

use crate::ids::SchoolId;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSchoolDto {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 50))]
    pub code: String,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSchoolDto {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchoolFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_school_requires_code() {
        let dto = CreateSchoolDto {
            name: "Riverside High".into(),
            code: "R".into(),
            address: None,
            phone: None,
            email: Some("office@riverside.edu".into()),
        };
        assert!(dto.validate().unwrap_err().field_errors().contains_key("code"));
    }
}
