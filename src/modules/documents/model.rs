use schoolhub_core::Paginated;

pub use schoolhub_models::documents::*;

pub type PaginatedDocuments = Paginated<Document>;

/// File part of a multipart upload.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
