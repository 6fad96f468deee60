use anyhow::anyhow;
use schoolhub_core::AppError;
use schoolhub_core::file_storage::{FileStorage, LocalFileStorage};
use schoolhub_db::PgPool;
use schoolhub_models::ids::{DocumentId, SchoolId, StudentId, UserId};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::metrics;

use super::model::{
    DOCUMENT_COLUMNS, Document, DocumentFilterParams, PaginatedDocuments, UploadDocumentFields,
    UploadedFile,
};

const DOCUMENT_FILTER: &str = r#"
    WHERE is_deleted = FALSE
      AND ($1::uuid IS NULL OR school_id = $1)
      AND ($2::uuid IS NULL OR student_id = $2)
      AND ($3::uuid IS NULL OR course_id = $3)
      AND ($4::uuid IS NULL OR owner_id = $4)
      AND ($5::uuid IS NULL OR owner_id = $5 OR student_id = $6)
"#;

/// Restricts a listing to what one student may read: their uploads and
/// documents attached to their profile.
#[derive(Debug, Clone, Copy)]
pub struct StudentViewer {
    pub user_id: UserId,
    pub student_id: Option<StudentId>,
}

/// Storage key for a new upload: `<school>/<random>-<clean name>`.
fn storage_key(school_id: SchoolId, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        school_id,
        Uuid::new_v4().simple(),
        LocalFileStorage::sanitize_file_name(file_name)
    )
}

pub struct DocumentService;

impl DocumentService {
    /// Stores the bytes first, then the metadata row. A failed insert removes
    /// the stored file again.
    #[instrument(skip(db, storage, file, fields), fields(file.name = %file.file_name, file.size = file.bytes.len()))]
    pub async fn upload(
        db: &PgPool,
        storage: &dyn FileStorage,
        school_id: SchoolId,
        owner_id: UserId,
        fields: UploadDocumentFields,
        file: UploadedFile,
    ) -> Result<Document, AppError> {
        storage.check_upload(&file.content_type, file.bytes.len())?;

        let key = storage_key(school_id, &file.file_name);
        storage.save(&key, &file.bytes).await?;

        let inserted = sqlx::query_as::<_, Document>(&format!(
            r#"INSERT INTO documents
                 (school_id, owner_id, student_id, course_id, file_name, content_type,
                  size_bytes, storage_key, description)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {DOCUMENT_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(owner_id)
        .bind(fields.student_id)
        .bind(fields.course_id)
        .bind(file.file_name.trim())
        .bind(&file.content_type)
        .bind(file.bytes.len() as i64)
        .bind(&key)
        .bind(&fields.description)
        .fetch_one(db)
        .await;

        let document = match inserted {
            Ok(document) => document,
            Err(e) => {
                if let Err(cleanup) = storage.delete(&key).await {
                    warn!(storage.key = %key, error = %cleanup, "Failed to remove orphaned upload");
                }
                return Err(e.into());
            }
        };

        metrics::track_document_uploaded(file.bytes.len());
        info!(document.id = %document.id, "Document uploaded");
        Ok(document)
    }

    #[instrument(skip(db, filters))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        viewer: Option<StudentViewer>,
        filters: DocumentFilterParams,
    ) -> Result<PaginatedDocuments, AppError> {
        let pagination = &filters.pagination;
        let viewer_user = viewer.map(|v| v.user_id);
        let viewer_student = viewer.and_then(|v| v.student_id);

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM documents {DOCUMENT_FILTER}"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.owner_id)
        .bind(viewer_user)
        .bind(viewer_student)
        .fetch_one(db)
        .await?;

        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents {DOCUMENT_FILTER} \
             ORDER BY created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(scope)
        .bind(filters.student_id)
        .bind(filters.course_id)
        .bind(filters.owner_id)
        .bind(viewer_user)
        .bind(viewer_student)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(PaginatedDocuments::new(documents, pagination, total))
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: DocumentId,
    ) -> Result<Document, AppError> {
        sqlx::query_as::<_, Document>(&format!(
            r#"SELECT {DOCUMENT_COLUMNS} FROM documents
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Document not found")))
    }

    #[instrument(skip(storage, document), fields(document.id = %document.id))]
    pub async fn content(
        storage: &dyn FileStorage,
        document: &Document,
    ) -> Result<Vec<u8>, AppError> {
        let bytes = storage.read(&document.storage_key).await?;
        Ok(bytes)
    }

    /// Soft delete of the row; the stored bytes are removed for good.
    #[instrument(skip(db, storage, document), fields(document.id = %document.id))]
    pub async fn delete(
        db: &PgPool,
        storage: &dyn FileStorage,
        document: &Document,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE documents SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(document.id)
        .execute(db)
        .await?;

        if let Err(e) = storage.delete(&document.storage_key).await {
            error!(storage.key = %document.storage_key, error = %e, "Failed to delete stored file");
        }
        info!("Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_school_scoped_and_clean() {
        let school = SchoolId::new();
        let key = storage_key(school, "../../etc/pass wd.txt");
        assert!(key.starts_with(&format!("{school}/")));
        assert!(key.ends_with("-pass_wd.txt"));
        assert!(!key.contains(".."));
    }

    #[test]
    fn test_storage_keys_are_unique() {
        let school = SchoolId::new();
        assert_ne!(storage_key(school, "a.pdf"), storage_key(school, "a.pdf"));
    }
}
