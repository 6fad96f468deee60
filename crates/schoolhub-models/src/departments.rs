use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::{deserialize_optional_string, deserialize_optional_uuid};

use crate::ids::{DepartmentId, SchoolId, TeacherId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: DepartmentId,
    pub school_id: SchoolId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub head_teacher_id: Option<TeacherId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDepartmentDto {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub description: Option<String>,
    pub head_teacher_id: Option<TeacherId>,
    pub school_id: Option<SchoolId>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateDepartmentDto {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    pub description: Option<String>,
    pub head_teacher_id: Option<TeacherId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub school_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}
