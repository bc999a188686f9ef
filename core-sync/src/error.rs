//! Error types for the sync subsystem

use core_notes::Provider;
use thiserror::Error;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// The selected provider has no working backend
    #[error("Backend for provider '{provider}' is not implemented")]
    NotImplemented { provider: Provider },

    /// The backend rejected or failed an operation
    #[error("Backend operation failed: {message}")]
    Backend { message: String },

    /// The backend is currently unreachable
    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// Malformed data from the backend
    #[error("Invalid remote data: {0}")]
    InvalidRemoteData(String),

    /// Sync configuration problem (missing credentials, bad root path)
    #[error("Sync configuration error: {0}")]
    Configuration(String),

    /// Local note store error
    #[error("Note store error: {0}")]
    Notes(#[from] core_notes::NotesError),

    /// Platform bridge error (HTTP, filesystem, settings)
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
