//! File storage
//!
//! Uploaded files are written under the configured upload directory with
//! UUID file names and served back from `/uploads/<path>`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File type not allowed: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file received from a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Where a stored file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the storage root
    pub path: String,
    pub size: u64,
    pub mime_type: String,
}

/// Storage collaborator used by the file-bearing services
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Validate and persist `file` under `folder`
    async fn store(&self, file: &UploadedFile, folder: &str) -> Result<StoredFile, StorageError>;

    /// Absolute URL for a stored path
    fn url_for(&self, path: &str) -> String;

    /// Delete a stored file. Missing files are not an error.
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Local-directory storage
pub struct LocalFileStorage {
    config: UploadConfig,
}

impl LocalFileStorage {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Resolve a relative path inside the root, refusing anything that
    /// could escape it
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let candidate = Path::new(relative);
        let safe = !relative.is_empty()
            && candidate
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.config.path.join(candidate))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, file: &UploadedFile, folder: &str) -> Result<StoredFile, StorageError> {
        if !self.config.is_type_allowed(&file.content_type) {
            return Err(StorageError::UnsupportedType(file.content_type.clone()));
        }
        if file.data.is_empty() {
            return Err(StorageError::Empty);
        }
        if file.size() > self.config.max_file_size {
            return Err(StorageError::TooLarge {
                size: file.size(),
                max: self.config.max_file_size,
            });
        }

        let ext = self.config.get_extension(&file.content_type);
        let relative = format!("{}/{}.{}", folder, Uuid::new_v4(), ext);
        let target = self.resolve(&relative)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &file.data).await?;

        tracing::debug!(path = %relative, size = file.size(), "Stored upload");
        Ok(StoredFile {
            path: relative,
            size: file.size(),
            mime_type: file.content_type.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/uploads/{}",
            self.config.public_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Remove a file that is no longer referenced. Failures are logged and
/// otherwise ignored.
pub async fn remove_quietly(storage: &dyn FileStorage, path: &str) {
    if let Err(e) = storage.remove(path).await {
        tracing::warn!(path, error = %e, "Failed to remove stored file");
    }
}
