//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileEntry, FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Backs the folder sync backend with direct filesystem access. Mobile hosts
/// substitute a document-provider implementation; the trait surface is the
/// same.
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Convert std::io::Error to BridgeError, preserving not-found and
    /// permission failures so callers can surface them distinctly.
    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        match e.kind() {
            std::io::ErrorKind::NotFound => BridgeError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                BridgeError::PermissionDenied(path.display().to_string())
            }
            _ => BridgeError::Io(e),
        }
    }

    fn convert_metadata(metadata: &std::fs::Metadata) -> FileMetadata {
        FileMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        Ok(Self::convert_metadata(&metadata))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }

        fs::write(path, data.as_ref())
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)
            .await
            .map_err(|e| Self::map_io_error(from, e))?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(path, e))?
        {
            let entry_path = entry.path();
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| Self::map_io_error(&entry_path, e))?;
            entries.push(FileEntry {
                path: entry_path,
                metadata: Self::convert_metadata(&metadata),
            });
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_rename_delete() {
        let fs = TokioFileSystem::new();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.md");
        let renamed = dir.path().join("renamed.md");

        let data = Bytes::from("# Hello");
        fs.write_file(&file, data.clone()).await.unwrap();
        assert_eq!(fs.read_file(&file).await.unwrap(), data);

        fs.rename(&file, &renamed).await.unwrap();
        assert!(!fs.exists(&file).await.unwrap());
        assert!(fs.exists(&renamed).await.unwrap());

        fs.delete_file(&renamed).await.unwrap();
        assert!(!fs.exists(&renamed).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let fs = TokioFileSystem::new();
        let dir = tempfile::tempdir().unwrap();

        let err = fs
            .read_file(&dir.path().join("missing.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_directory_includes_metadata() {
        let fs = TokioFileSystem::new();
        let dir = tempfile::tempdir().unwrap();
        fs.write_file(&dir.path().join("a.md"), Bytes::from("a"))
            .await
            .unwrap();
        fs.create_dir_all(&dir.path().join("sub")).await.unwrap();

        let mut entries = fs.list_directory(dir.path()).await.unwrap();
        entries.sort_by_key(|e| e.name());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), "a.md");
        assert!(!entries[0].metadata.is_directory);
        assert!(entries[1].metadata.is_directory);
    }
}
