//! Document storage backends.
//!
//! Uploaded documents (transcripts, assignment attachments, profile files)
//! go through the [`FileStorage`] trait so the backend can be swapped without
//! touching the document service. [`LocalFileStorage`] keeps files under a
//! directory on disk.
//!
//! ```ignore
//! let storage = LocalFileStorage::new(PathBuf::from("./storage/uploads"), base_url);
//! storage.check_upload("application/pdf", bytes.len())?;
//! let key = storage.save("schools/3f1.../report.pdf", &bytes).await?;
//! let bytes = storage.read(&key).await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;
use tokio::fs;

pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Default upload limit: 10MB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/webp",
    "text/plain",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

pub trait FileStorage: Send + Sync {
    /// Save file content under `key` and return the key.
    fn save<'a>(&'a self, key: &'a str, content: &'a [u8]) -> StorageFuture<'a, String>;

    /// Read the full content stored under `key`.
    fn read<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Vec<u8>>;

    /// Delete a file. Missing files are not an error.
    fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()>;

    /// Public URL for a stored key.
    fn get_url(&self, key: &str) -> Result<String, StorageError>;

    /// Validate an upload before it is written.
    fn check_upload(&self, content_type: &str, size: usize) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File exceeds maximum size of {max_bytes} bytes")]
    InvalidFileSize { max_bytes: usize },

    #[error("MIME type '{received}' not allowed. Allowed types: {}", .allowed.join(", "))]
    InvalidMimeType {
        received: String,
        allowed: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found")]
    NotFound,

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

#[derive(Clone)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    base_url: String,
    max_file_size: usize,
    allowed_mime_types: Vec<String>,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self::with_max_size(base_dir, base_url, DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: PathBuf, base_url: String, max_file_size: usize) -> Self {
        Self {
            base_dir,
            base_url,
            max_file_size,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Reject keys that could escape the base directory.
    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(
                "Key must not be empty, contain '..', or start with a separator".to_string(),
            ));
        }

        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
        {
            return Err(StorageError::InvalidKey(
                "Key contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Turn a user-supplied file name into something safe to embed in a key.
    pub fn sanitize_file_name(name: &str) -> String {
        let cleaned: String = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let trimmed = cleaned.trim_matches('.');
        if trimmed.is_empty() {
            "file".to_string()
        } else {
            trimmed.replace("..", "_")
        }
    }
}

impl FileStorage for LocalFileStorage {
    fn save<'a>(&'a self, key: &'a str, content: &'a [u8]) -> StorageFuture<'a, String> {
        Box::pin(async move {
            Self::validate_key(key)?;

            if content.len() > self.max_file_size {
                return Err(StorageError::InvalidFileSize {
                    max_bytes: self.max_file_size,
                });
            }

            let file_path = self.base_dir.join(key);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&file_path, content).await?;

            Ok(key.to_string())
        })
    }

    fn read<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Vec<u8>> {
        Box::pin(async move {
            Self::validate_key(key)?;

            match fs::read(self.base_dir.join(key)).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            Self::validate_key(key)?;

            match fs::remove_file(self.base_dir.join(key)).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn get_url(&self, key: &str) -> Result<String, StorageError> {
        Self::validate_key(key)?;
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
    }

    fn check_upload(&self, content_type: &str, size: usize) -> Result<(), StorageError> {
        if size == 0 || size > self.max_file_size {
            return Err(StorageError::InvalidFileSize {
                max_bytes: self.max_file_size,
            });
        }

        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !self.allowed_mime_types.iter().any(|m| *m == mime) {
            return Err(StorageError::InvalidMimeType {
                received: content_type.to_string(),
                allowed: self.allowed_mime_types.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (LocalFileStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("schoolhub-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalFileStorage::with_max_size(
            dir.clone(),
            "http://localhost:3000/files".to_string(),
            16,
        );
        (storage, dir)
    }

    #[test]
    fn test_validate_key_accepts_valid_keys() {
        assert!(LocalFileStorage::validate_key("schools/report.pdf").is_ok());
        assert!(LocalFileStorage::validate_key("documents/abc-123_v2.png").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_path_traversal() {
        assert!(LocalFileStorage::validate_key("../../../etc/passwd").is_err());
        assert!(LocalFileStorage::validate_key("..\\windows\\system32").is_err());
        assert!(LocalFileStorage::validate_key("/etc/passwd").is_err());
        assert!(LocalFileStorage::validate_key("").is_err());
    }

    #[test]
    fn test_sanitize_file_name_strips_directories() {
        assert_eq!(LocalFileStorage::sanitize_file_name("../../evil.sh"), "evil.sh");
        assert_eq!(
            LocalFileStorage::sanitize_file_name("C:\\docs\\My Report.pdf"),
            "My_Report.pdf"
        );
        assert_eq!(LocalFileStorage::sanitize_file_name(".."), "file");
    }

    #[test]
    fn test_get_url_handles_trailing_slash() {
        let storage = LocalFileStorage::new(
            PathBuf::from("./uploads"),
            "http://localhost:3000/files/".to_string(),
        );
        assert_eq!(
            storage.get_url("docs/a.pdf").unwrap(),
            "http://localhost:3000/files/docs/a.pdf"
        );
    }

    #[test]
    fn test_check_upload_rules() {
        let (storage, _) = temp_storage();
        assert!(storage.check_upload("application/pdf", 10).is_ok());
        assert!(storage.check_upload("application/pdf; charset=binary", 10).is_ok());
        assert!(matches!(
            storage.check_upload("application/x-msdownload", 10),
            Err(StorageError::InvalidMimeType { .. })
        ));
        assert!(matches!(
            storage.check_upload("application/pdf", 17),
            Err(StorageError::InvalidFileSize { max_bytes: 16 })
        ));
        assert!(storage.check_upload("application/pdf", 0).is_err());
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let (storage, dir) = temp_storage();

        let key = storage.save("docs/a.txt", b"hello").await.unwrap();
        assert_eq!(storage.read(&key).await.unwrap(), b"hello");

        storage.delete(&key).await.unwrap();
        assert!(matches!(storage.read(&key).await, Err(StorageError::NotFound)));
        // second delete is a no-op
        storage.delete(&key).await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_content() {
        let (storage, _) = temp_storage();
        let result = storage.save("docs/big.bin", &[0u8; 32]).await;
        assert!(matches!(result, Err(StorageError::InvalidFileSize { .. })));
    }
}
