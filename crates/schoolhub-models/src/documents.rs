use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use schoolhub_core::PaginationParams;
use schoolhub_core::serde::deserialize_optional_uuid;

use crate::ids::{CourseId, DocumentId, SchoolId, StudentId, UserId};

/// Metadata for an uploaded file. The bytes live in the storage backend
/// under `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: DocumentId,
    pub school_id: SchoolId,
    pub owner_id: UserId,
    pub student_id: Option<StudentId>,
    pub course_id: Option<CourseId>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DOCUMENT_COLUMNS: &str = "id, school_id, owner_id, student_id, course_id, file_name, \
     content_type, size_bytes, storage_key, description, created_at, updated_at";

/// Text fields accompanying a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct UploadDocumentFields {
    pub student_id: Option<StudentId>,
    pub course_id: Option<CourseId>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub student_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub owner_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_not_exposed() {
        let doc = Document {
            id: DocumentId::new(),
            school_id: SchoolId::new(),
            owner_id: UserId::new(),
            student_id: None,
            course_id: None,
            file_name: "report.pdf".into(),
            content_type: "application/pdf".into(),
            size_bytes: 42,
            storage_key: "school/abc/report.pdf".into(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("storage_key").is_none());
        assert_eq!(json["file_name"], "report.pdf");
    }
}
