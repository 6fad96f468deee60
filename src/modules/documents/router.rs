use axum::{Router, extract::DefaultBodyLimit, routing::get};
use schoolhub_config::StorageConfig;

use crate::state::AppState;

use super::controller::{
    delete_document, download_document, get_document, get_documents, upload_document,
};

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn init_documents_router() -> Router<AppState> {
    let body_limit = StorageConfig::from_env().max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/",
            get(get_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}", get(get_document).delete(delete_document))
        .route("/{id}/download", get(download_document))
}
