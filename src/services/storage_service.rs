use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use uuid::Uuid;

/// An uploaded file captured from a multipart field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn extension(&self) -> String {
        extension_of(&self.file_name)
    }
}

/// Lowercased extension of a client file name, empty when it has none.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Where listing attachments and application files live. `remove` is
/// idempotent: deleting a path that is already gone succeeds.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, category: &str, file: &UploadedFile) -> Result<String>;
    async fn remove(&self, path: &str) -> Result<()>;
}

/// Local-disk store rooted at the configured uploads directory. Stored names
/// are fresh UUIDs so client file names never reach the filesystem.
pub struct DiskStore {
    root: String,
}

impl DiskStore {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for DiskStore {
    async fn save(&self, category: &str, file: &UploadedFile) -> Result<String> {
        let dir = format!("{}/{}", self.root, category);
        tokio::fs::create_dir_all(&dir).await?;

        let extension = file.extension();
        let saved_name = if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), extension)
        };
        let path = format!("{}/{}", dir, saved_name);
        tokio::fs::write(&path, &file.bytes).await?;
        Ok(path)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
