use anyhow::anyhow;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use schoolhub_core::AppError;
use schoolhub_models::audit::AuditAction;
use schoolhub_models::ids::{DocumentId, SchoolId};

use crate::middleware::auth::{
    AuthUser, RequireDocumentsDelete, RequireDocumentsRead, RequireDocumentsUpload,
};
use crate::modules::audit_logs::AuditService;
use crate::state::AppState;
use crate::utils::auth_helpers::{
    list_scope, require_own_student_id, resource_scope, scoped_school_id, student_id_for_user,
};

use super::model::{
    Document, DocumentFilterParams, PaginatedDocuments, UploadDocumentFields, UploadedFile,
};
use super::service::{DocumentService, StudentViewer};

fn parse_id<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request(anyhow!("Invalid {field}")))
}

struct Upload {
    school_id: Option<SchoolId>,
    fields: UploadDocumentFields,
    file: UploadedFile,
}

/// Splits the multipart body into the file and its text fields.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut school_id = None;
    let mut fields = UploadDocumentFields::default();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(anyhow!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(anyhow!("Failed to read file: {e}")))?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "school_id" | "student_id" | "course_id" | "description" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(anyhow!("Invalid field {name}: {e}")))?;
                if value.trim().is_empty() {
                    continue;
                }
                match name.as_str() {
                    "school_id" => school_id = Some(parse_id(&name, &value)?),
                    "student_id" => fields.student_id = Some(parse_id(&name, &value)?),
                    "course_id" => fields.course_id = Some(parse_id(&name, &value)?),
                    _ => fields.description = Some(value),
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::bad_request(anyhow!("Missing file field")))?;
    Ok(Upload {
        school_id,
        fields,
        file,
    })
}

/// Students see documents they uploaded or that are attached to them.
async fn ensure_can_read(
    state: &AppState,
    auth_user: &AuthUser,
    document: &Document,
) -> Result<(), AppError> {
    if !auth_user.is_student() || document.owner_id == auth_user.user_id()? {
        return Ok(());
    }
    let own = require_own_student_id(&state.db, auth_user).await?;
    if document.student_id != Some(own) {
        return Err(AppError::forbidden("You do not have access to this document"));
    }
    Ok(())
}

pub async fn upload_document(
    State(state): State<AppState>,
    RequireDocumentsUpload(auth_user): RequireDocumentsUpload,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let Upload {
        school_id,
        mut fields,
        file,
    } = read_upload(multipart).await?;
    let school_id = scoped_school_id(&auth_user, school_id)?;

    if auth_user.is_student() {
        fields.student_id = Some(require_own_student_id(&state.db, &auth_user).await?);
    }

    let document = DocumentService::upload(
        &state.db,
        state.storage.as_ref(),
        school_id,
        auth_user.user_id()?,
        fields,
        file,
    )
    .await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Create, "document", document.id)
            .new_values(&document),
    )
    .await;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn get_documents(
    State(state): State<AppState>,
    RequireDocumentsRead(auth_user): RequireDocumentsRead,
    filters: Result<Query<DocumentFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedDocuments>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow!("Invalid query parameters: {}", e)))?;
    let scope = list_scope(&auth_user, None)?;
    let viewer = if auth_user.is_student() {
        let user_id = auth_user.user_id()?;
        Some(StudentViewer {
            user_id,
            student_id: student_id_for_user(&state.db, user_id).await?,
        })
    } else {
        None
    };

    let documents = DocumentService::list(&state.db, scope, viewer, filters).await?;
    Ok(Json(documents))
}

pub async fn get_document(
    State(state): State<AppState>,
    RequireDocumentsRead(auth_user): RequireDocumentsRead,
    Path(id): Path<DocumentId>,
) -> Result<Json<Document>, AppError> {
    let document = DocumentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ensure_can_read(&state, &auth_user, &document).await?;
    Ok(Json(document))
}

/// Original bytes with the stored content type.
pub async fn download_document(
    State(state): State<AppState>,
    RequireDocumentsRead(auth_user): RequireDocumentsRead,
    Path(id): Path<DocumentId>,
) -> Result<Response, AppError> {
    let document = DocumentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    ensure_can_read(&state, &auth_user, &document).await?;

    let bytes = DocumentService::content(state.storage.as_ref(), &document).await?;

    let content_type = HeaderValue::from_str(&document.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        document.file_name.replace('"', "")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(AppError::internal)
}

pub async fn delete_document(
    State(state): State<AppState>,
    RequireDocumentsDelete(auth_user): RequireDocumentsDelete,
    headers: HeaderMap,
    Path(id): Path<DocumentId>,
) -> Result<StatusCode, AppError> {
    let document = DocumentService::get(&state.db, resource_scope(&auth_user)?, id).await?;
    DocumentService::delete(&state.db, state.storage.as_ref(), &document).await?;

    AuditService::record(
        &state.db,
        AuditService::entry(&auth_user, &headers, AuditAction::Delete, "document", id)
            .old(&document),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
