//! Error types for the Nextcloud backend

use bridge_traits::error::BridgeError;
use core_sync::SyncError;
use thiserror::Error;

/// Errors from talking to a Nextcloud Notes API server
#[derive(Debug, Error)]
pub enum NextcloudError {
    /// Transport failure from the HTTP bridge
    #[error("HTTP transport error: {0}")]
    Http(#[from] BridgeError),

    /// The server answered with a non-success status
    #[error("Server returned {status} for {operation}")]
    Status { status: u16, operation: String },

    /// A mapping without a numeric remote id was used for a remote operation
    #[error("Mapping carries no remote note id")]
    MissingRemoteId,

    /// The server response could not be interpreted
    #[error("Malformed server response: {0}")]
    MalformedResponse(String),

    /// A required connection setting is absent or blank
    #[error("Missing setting '{0}'")]
    MissingSetting(&'static str),
}

impl From<NextcloudError> for SyncError {
    fn from(e: NextcloudError) -> Self {
        match e {
            NextcloudError::Http(inner) => SyncError::Bridge(inner),
            NextcloudError::MalformedResponse(message) => SyncError::InvalidRemoteData(message),
            e @ NextcloudError::MissingSetting(_) => SyncError::Configuration(e.to_string()),
            other => SyncError::Backend {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for Nextcloud operations
pub type Result<T> = std::result::Result<T, NextcloudError>;
