//! Storage Abstractions
//!
//! Provides platform-agnostic traits for document-tree file I/O and key-value
//! settings storage.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    /// Last modification time, epoch seconds
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// A directory entry paired with its metadata, as returned by a single
/// listing call.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub metadata: FileMetadata,
}

impl FileEntry {
    /// File name component, lossily decoded.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Document-tree file access trait
///
/// Abstracts the user-granted storage location used by the folder sync
/// backend:
/// - Desktop: a directory on the local filesystem
/// - Android: a SAF document tree behind a persisted permission grant
/// - Test harness: an in-memory tree
///
/// All paths are interpreted relative to a root the host has verified the
/// application may read and write. Operations on revoked or missing locations
/// must fail with `PermissionDenied`/`NotFound` rather than panic.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Rename/move a file within the tree
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    ///
    /// Deleting a file that does not exist is an error (`NotFound`).
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List the entries of a single directory (non-recursive), with metadata
    async fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>>;
}

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences storage:
/// - Android: SharedPreferences / DataStore
/// - Desktop: config files or OS-specific preferences
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preference(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("sync.provider", "nextcloud").await?;
///     store.set_bool("sync.on_metered", false).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_name() {
        let entry = FileEntry {
            path: PathBuf::from("/notes/groceries.md"),
            metadata: FileMetadata {
                size: 128,
                modified_at: Some(1234567890),
                is_directory: false,
            },
        };

        assert_eq!(entry.name(), "groceries.md");
        assert!(!entry.metadata.is_directory);
    }
}
