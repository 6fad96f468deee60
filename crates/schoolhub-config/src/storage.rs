use std::env;
use std::path::PathBuf;

use crate::env_or;

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Prefix used when building public document URLs.
    pub base_url: String,
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            upload_dir: PathBuf::from(
                env::var("STORAGE_DIR").unwrap_or_else(|_| "./storage/uploads".to_string()),
            ),
            base_url: env::var("STORAGE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api/v1/documents".to_string()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        }
    }
}
