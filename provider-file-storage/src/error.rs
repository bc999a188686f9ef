//! Error types for the folder backend

use bridge_traits::error::BridgeError;
use core_sync::SyncError;
use thiserror::Error;

/// Errors from syncing notes into a storage folder
#[derive(Debug, Error)]
pub enum FileStorageError {
    /// Filesystem failure from the platform bridge
    #[error("Filesystem error: {0}")]
    Io(#[from] BridgeError),

    /// The granted root folder is missing or not a directory
    #[error("Storage root unusable: {0}")]
    RootUnusable(String),

    /// A mapping without a storage URI was used for a remote operation
    #[error("Mapping carries no storage URI")]
    MissingStorageUri,
}

impl From<FileStorageError> for SyncError {
    fn from(e: FileStorageError) -> Self {
        match e {
            FileStorageError::Io(inner) => SyncError::Bridge(inner),
            other => SyncError::Backend {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for folder backend operations
pub type Result<T> = std::result::Result<T, FileStorageError>;
